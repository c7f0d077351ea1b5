// ── Decoded value store ──
//
// Latest-value-wins map from label to decoded display text. Written only
// by the subscription path, read by anything that displays values.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tokio::sync::watch;

/// Label → decoded value. No history; a new value replaces the old one.
pub struct StateStore {
    values: DashMap<String, String>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
}

impl StateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            values: DashMap::new(),
            version,
        }
    }

    /// Store `value` under `label`. Returns `true` if the stored text changed.
    pub fn set(&self, label: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        let previous = self.values.insert(label.into(), value.clone());
        self.bump_version();
        previous.as_deref() != Some(value.as_str())
    }

    pub fn get(&self, label: &str) -> Option<String> {
        self.values.get(label).map(|r| r.value().clone())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.values.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
        self.bump_version();
    }

    /// Point-in-time copy, sorted by label.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribe to the version counter; it changes on every write.
    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_wins() {
        let store = StateStore::new();
        assert!(store.set("Audio.Gain", "-12"));
        assert!(store.set("Audio.Gain", "-6"));
        assert_eq!(store.get("Audio.Gain").unwrap(), "-6");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_reports_unchanged_text() {
        let store = StateStore::new();
        store.set("Mute", "true");
        assert!(!store.set("Mute", "true"));
    }

    #[test]
    fn every_write_bumps_version() {
        let store = StateStore::new();
        let before = store.version();
        store.set("a", "1");
        store.set("a", "1");
        store.clear();
        assert_eq!(store.version(), before + 3);
        assert!(store.is_empty());
    }

    #[test]
    fn version_subscribers_see_writes() {
        let store = StateStore::new();
        let mut rx = store.subscribe_version();
        assert!(!rx.has_changed().unwrap());

        store.set("Audio.Mode", "On");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), store.version());
    }

    #[test]
    fn snapshot_is_sorted_by_label() {
        let store = StateStore::new();
        store.set("b", "2");
        store.set("a", "1");
        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
