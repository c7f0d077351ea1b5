// ── Subscription manager ──
//
// Keeps one provider subscription per registered path and routes pushes
// to the label they are published under. Every decode lands in the
// state store and is broadcast as a `ValueChanged` signal.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

use emberlink_api::{ParameterUpdate, Provider, QualifiedPath, TreeNode, UpdateSink};

use crate::decode::decode;
use crate::error::CoreError;
use crate::store::{MonitoredParameter, ParameterRegistry, StateStore};

/// A label whose decoded value was just written to the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueChanged {
    pub label: String,
    pub value: String,
}

/// Counts from [`SubscriptionManager::subscribe_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscribeReport {
    pub subscribed: usize,
    pub failed: usize,
}

pub struct SubscriptionManager {
    /// Subscribed path → label.
    routes: DashMap<QualifiedPath, String>,
    store: Arc<StateStore>,
    changes: broadcast::Sender<ValueChanged>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<StateStore>, changes: broadcast::Sender<ValueChanged>) -> Self {
        Self {
            routes: DashMap::new(),
            store,
            changes,
        }
    }

    /// Subscribe one monitored parameter and decode its current value.
    ///
    /// Returns `Ok(false)` when the path does not exist on the provider.
    /// Subscribing an already subscribed path is a no-op.
    pub async fn subscribe<P: Provider>(
        &self,
        provider: &P,
        parameter: &MonitoredParameter,
        sink: &UpdateSink,
    ) -> Result<bool, CoreError> {
        if self.routes.contains_key(&parameter.path) {
            trace!(path = %parameter.path, "already subscribed");
            return Ok(true);
        }

        let Some(node) = provider.subscribe(&parameter.path, sink.clone()).await? else {
            return Ok(false);
        };

        self.routes
            .insert(parameter.path.clone(), parameter.label.clone());
        debug!(path = %parameter.path, label = %parameter.label, "subscribed");
        self.apply(&parameter.label, &node);
        Ok(true)
    }

    /// Subscribe every registry entry. Entries that cannot be subscribed
    /// are logged and removed from the registry; the rest carry on.
    pub async fn subscribe_all<P: Provider>(
        &self,
        provider: &P,
        registry: &ParameterRegistry,
        sink: &UpdateSink,
    ) -> SubscribeReport {
        let mut report = SubscribeReport::default();

        for parameter in registry.entries().iter() {
            match self.subscribe(provider, parameter, sink).await {
                Ok(true) => report.subscribed += 1,
                Ok(false) => {
                    warn!(path = %parameter.path, label = %parameter.label, "monitored parameter not found");
                    registry.remove(&parameter.path);
                    report.failed += 1;
                }
                Err(e) => {
                    error!(
                        path = %parameter.path,
                        label = %parameter.label,
                        error = %e,
                        "failed to subscribe parameter"
                    );
                    registry.remove(&parameter.path);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Decode a push and publish it. Pushes for paths without a route
    /// are dropped.
    pub fn handle_update(&self, update: &ParameterUpdate) -> Option<ValueChanged> {
        let Some(label) = self.routes.get(&update.path).map(|r| r.value().clone()) else {
            trace!(path = %update.path, "dropping push for unmonitored path");
            return None;
        };
        self.apply(&label, &update.node)
    }

    /// Drop every provider subscription and forget all routes.
    pub async fn unsubscribe_all<P: Provider>(&self, provider: &P) {
        let paths: Vec<QualifiedPath> = self.routes.iter().map(|r| r.key().clone()).collect();
        self.routes.clear();

        for path in paths {
            if let Err(e) = provider.unsubscribe(&path).await {
                debug!(path = %path, error = %e, "unsubscribe failed");
            }
        }
    }

    pub fn is_subscribed(&self, path: &QualifiedPath) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn apply(&self, label: &str, node: &TreeNode) -> Option<ValueChanged> {
        let contents = node.as_parameter()?;
        let value = decode(contents);
        trace!(path = %node.path, label, value = %value, "decoded value");

        self.store.set(label, value.clone());
        let change = ValueChanged {
            label: label.to_owned(),
            value,
        };
        // No receivers is fine: nobody is displaying values yet.
        let _ = self.changes.send(change.clone());
        Some(change)
    }
}
