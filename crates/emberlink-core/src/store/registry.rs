// ── Monitored parameter registry ──
//
// Ordered, path-unique list of parameters the session monitors. The
// length of the list is the capacity counter: registration checks it
// right before inserting, nothing is reserved ahead of time.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use emberlink_api::QualifiedPath;

/// Hard cap on monitored parameters per session.
pub const MAX_MONITORED_PARAMETERS: usize = 2048;

/// A parameter the session keeps a subscription for, and the label its
/// decoded value is published under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitoredParameter {
    pub path: QualifiedPath,
    pub label: String,
}

/// Result of [`ParameterRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Registration {
    Added,
    AlreadyRegistered,
    AtCapacity,
}

impl Registration {
    pub fn is_added(self) -> bool {
        self == Self::Added
    }
}

type Snapshot = Arc<Vec<Arc<MonitoredParameter>>>;

/// Bounded registry of monitored parameters, unique by path.
pub struct ParameterRegistry {
    entries: RwLock<IndexMap<QualifiedPath, Arc<MonitoredParameter>>>,
    capacity: usize,
    snapshot: watch::Sender<Snapshot>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_MONITORED_PARAMETERS)
    }

    /// A registry with a smaller cap. The cap never exceeds
    /// [`MAX_MONITORED_PARAMETERS`].
    pub fn with_capacity(capacity: usize) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity: capacity.min(MAX_MONITORED_PARAMETERS),
            snapshot,
        }
    }

    /// Append `(path, label)` unless the registry is full or already
    /// monitors `path`.
    pub fn register(&self, path: QualifiedPath, label: impl Into<String>) -> Registration {
        let label = label.into();
        let outcome = {
            let mut entries = self.entries.write().expect("registry lock poisoned");
            if entries.contains_key(&path) {
                Registration::AlreadyRegistered
            } else if entries.len() >= self.capacity {
                Registration::AtCapacity
            } else {
                let entry = Arc::new(MonitoredParameter {
                    path: path.clone(),
                    label: label.clone(),
                });
                entries.insert(path.clone(), entry);
                Registration::Added
            }
        };

        match outcome {
            Registration::Added => {
                debug!(path = %path, label = %label, "registered parameter");
                self.rebuild_snapshot();
            }
            Registration::AlreadyRegistered => {
                debug!(path = %path, label = %label, "parameter already registered");
            }
            Registration::AtCapacity => {
                debug!(path = %path, label = %label, capacity = self.capacity, "registry full, skipping parameter");
            }
        }
        outcome
    }

    pub fn find(&self, path: &QualifiedPath) -> Option<Arc<MonitoredParameter>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(path)
            .cloned()
    }

    /// First entry registered under `label`. Labels are not unique.
    pub fn find_by_label(&self, label: &str) -> Option<Arc<MonitoredParameter>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .find(|entry| entry.label == label)
            .cloned()
    }

    /// Remove an entry, keeping the order of the rest.
    pub fn remove(&self, path: &QualifiedPath) -> Option<Arc<MonitoredParameter>> {
        let removed = self
            .entries
            .write()
            .expect("registry lock poisoned")
            .shift_remove(path);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().expect("registry lock poisoned").clear();
        self.rebuild_snapshot();
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Entries in registration order (cheap `Arc` clone).
    pub fn entries(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to changes of the entry list.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    fn rebuild_snapshot(&self) {
        let values: Vec<_> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(text: &str) -> QualifiedPath {
        text.parse().unwrap()
    }

    #[test]
    fn register_appends_in_order() {
        let registry = ParameterRegistry::new();
        assert!(registry.register(path("1.2"), "Audio.Gain").is_added());
        assert!(registry.register(path("1.1"), "Audio.Mute").is_added());

        let labels: Vec<_> = registry.entries().iter().map(|e| e.label.clone()).collect();
        assert_eq!(labels, vec!["Audio.Gain", "Audio.Mute"]);
    }

    #[test]
    fn register_is_unique_by_path() {
        let registry = ParameterRegistry::new();
        registry.register(path("1.2"), "first");
        assert_eq!(
            registry.register(path("1.2"), "second"),
            Registration::AlreadyRegistered
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(&path("1.2")).unwrap().label, "first");
    }

    #[test]
    fn register_stops_at_capacity() {
        let registry = ParameterRegistry::with_capacity(2);
        registry.register(path("1"), "a");
        registry.register(path("2"), "b");
        assert!(registry.is_full());
        assert_eq!(registry.register(path("3"), "c"), Registration::AtCapacity);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn capacity_never_exceeds_hard_cap() {
        let registry = ParameterRegistry::with_capacity(10_000);
        assert_eq!(registry.capacity(), MAX_MONITORED_PARAMETERS);

        for n in 0..2100u32 {
            registry.register(QualifiedPath::new(vec![1, n]), format!("p{n}"));
        }
        assert_eq!(registry.len(), MAX_MONITORED_PARAMETERS);
    }

    #[test]
    fn find_by_label_returns_first_registration() {
        let registry = ParameterRegistry::new();
        registry.register(path("1.1"), "Gain");
        registry.register(path("2.1"), "Gain");
        assert_eq!(registry.find_by_label("Gain").unwrap().path, path("1.1"));
        assert!(registry.find_by_label("Mute").is_none());
    }

    #[test]
    fn remove_frees_a_slot() {
        let registry = ParameterRegistry::with_capacity(1);
        registry.register(path("1"), "a");
        assert!(registry.remove(&path("1")).is_some());
        assert!(registry.register(path("2"), "b").is_added());
    }

    #[test]
    fn subscribers_see_clear() {
        let registry = ParameterRegistry::new();
        let rx = registry.subscribe();
        registry.register(path("1"), "a");
        assert_eq!(rx.borrow().len(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(rx.borrow().is_empty());
    }
}
