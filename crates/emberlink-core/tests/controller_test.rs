#![allow(clippy::unwrap_used)]
// Session lifecycle tests for `Controller`: build, push handling, command
// routing, reconnect and reconfiguration.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

use emberlink_api::{
    Error, Provider, ProviderEvent, QualifiedPath, SnapshotProvider, TreeNode, UpdateSink, Value,
};
use emberlink_core::{
    Command, ConnectionState, Controller, CoreError, FilterRules, ParameterRegistry, RawFilters,
    SessionConfig, StateStore, ValueChanged, WriteOutcome, WriteTarget, WriteValue,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Recording provider ──────────────────────────────────────────────

/// Snapshot provider that records how much session state was left over
/// each time a crawl starts at the root.
struct Recorder {
    inner: SnapshotProvider,
    connect_delay: Option<Duration>,
    registry: OnceLock<Arc<ParameterRegistry>>,
    store: OnceLock<Arc<StateStore>>,
    /// `(registry.len(), store.len())` at every root expansion.
    at_root: Mutex<Vec<(usize, usize)>>,
}

impl Recorder {
    fn new(inner: SnapshotProvider) -> Self {
        Self {
            inner,
            connect_delay: None,
            registry: OnceLock::new(),
            store: OnceLock::new(),
            at_root: Mutex::new(Vec::new()),
        }
    }

    fn observe(&self, controller: &Controller<Self>) {
        let _ = self.registry.set(Arc::clone(controller.registry()));
        let _ = self.store.set(Arc::clone(controller.store()));
    }

    fn at_root(&self) -> Vec<(usize, usize)> {
        self.at_root.lock().unwrap().clone()
    }
}

impl Provider for Recorder {
    fn address(&self) -> String {
        self.inner.address()
    }

    async fn connect(&self) -> Result<(), Error> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.connect().await
    }

    async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events()
    }

    fn root(&self) -> TreeNode {
        self.inner.root()
    }

    async fn expand(&self, node: &TreeNode) -> Result<Vec<TreeNode>, Error> {
        if node.path.is_root() {
            let registry = self.registry.get().map_or(0, |r| r.len());
            let store = self.store.get().map_or(0, |s| s.len());
            self.at_root.lock().unwrap().push((registry, store));
        }
        self.inner.expand(node).await
    }

    async fn resolve(&self, path: &QualifiedPath) -> Result<Option<TreeNode>, Error> {
        self.inner.resolve(path).await
    }

    async fn subscribe(
        &self,
        path: &QualifiedPath,
        sink: UpdateSink,
    ) -> Result<Option<TreeNode>, Error> {
        self.inner.subscribe(path, sink).await
    }

    async fn unsubscribe(&self, path: &QualifiedPath) -> Result<(), Error> {
        self.inner.unsubscribe(path).await
    }

    async fn write(&self, node: &TreeNode, value: Value) -> Result<(), Error> {
        self.inner.write(node, value).await
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn path(text: &str) -> QualifiedPath {
    text.parse().unwrap()
}

fn mixer() -> SnapshotProvider {
    SnapshotProvider::from_json_value(json!({
        "address": "mixer:9000",
        "nodes": [
            { "number": 1, "identifier": "Audio", "children": [
                { "number": 1, "identifier": "Gain", "type": "integer", "value": -120,
                  "minimum": -640, "maximum": 60, "factor": 10 },
                { "number": 2, "identifier": "Mode", "type": "enum", "value": 1,
                  "enumeration": "Off\nOn\nAuto" },
                { "number": 3, "identifier": "Mute", "type": "boolean", "value": false }
            ]},
            { "number": 2, "identifier": "Master", "type": "real", "value": 0.5 }
        ]
    }))
    .unwrap()
}

fn crawl_config(parameter_filters: Option<&str>) -> SessionConfig {
    SessionConfig {
        auto_parse: true,
        filters: FilterRules::compile(&RawFilters {
            parameter_filters: parameter_filters.map(str::to_owned),
            ..RawFilters::default()
        }),
        ..SessionConfig::default()
    }
}

fn recording_controller(config: SessionConfig) -> Controller<Recorder> {
    let controller = Controller::new(config, Recorder::new(mixer()));
    controller.provider().observe(&controller);
    controller
}

fn labels(controller: &Controller<Recorder>) -> Vec<String> {
    controller
        .parameters_snapshot()
        .iter()
        .map(|p| p.label.clone())
        .collect()
}

async fn wait_for_state(controller: &Controller<Recorder>, expected: ConnectionState) {
    let mut state = controller.connection_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == expected))
        .await
        .unwrap()
        .unwrap();
}

async fn wait_for_generation(controller: &Controller<Recorder>, generation: u64) {
    let mut sessions = controller.sessions();
    tokio::time::timeout(
        WAIT,
        sessions.wait_for(|s| s.as_ref().is_some_and(|s| s.generation == generation)),
    )
    .await
    .unwrap()
    .unwrap();
}

async fn next_change(changes: &mut broadcast::Receiver<ValueChanged>) -> ValueChanged {
    tokio::time::timeout(WAIT, changes.recv())
        .await
        .unwrap()
        .unwrap()
}

// ── Session build ───────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_crawls_subscribes_and_decodes() {
    let controller = recording_controller(crawl_config(None));

    controller.connect().await.unwrap();

    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Connected);
    assert_eq!(labels(&controller), vec!["Audio.Gain", "Audio.Mode", "Audio.Mute", "Master"]);
    assert_eq!(controller.value("Audio.Gain").as_deref(), Some("-12"));
    assert_eq!(controller.value("Audio.Mode").as_deref(), Some("On"));
    assert_eq!(controller.value("Audio.Mute").as_deref(), Some("false"));
    assert_eq!(controller.value("Master").as_deref(), Some("0.5"));

    let summary = controller.last_session().unwrap();
    assert_eq!(summary.generation, 1);
    assert_eq!(summary.monitored, 4);
    assert_eq!(summary.subscriptions.subscribed, 4);
    assert_eq!(
        controller.provider().inner.subscribed_paths(),
        vec![path("1.1"), path("1.2"), path("1.3"), path("2")]
    );

    controller.disconnect().await;
}

#[tokio::test]
async fn test_explicit_parameters_without_crawl() {
    let config = SessionConfig::from_raw(&RawFilters::default(), Some("1.2, 9.9"));
    let controller = recording_controller(config);

    controller.connect().await.unwrap();

    // 9.9 does not exist and is dropped from the registry.
    assert_eq!(labels(&controller), vec!["1.2"]);
    assert_eq!(controller.value("1.2").as_deref(), Some("On"));
    assert_eq!(controller.provider().inner.expansion_count(), 0);

    let summary = controller.last_session().unwrap();
    assert_eq!(summary.subscriptions.subscribed, 1);
    assert_eq!(summary.subscriptions.failed, 1);

    controller.disconnect().await;
}

#[tokio::test]
async fn test_pushes_update_state_store() {
    let controller = recording_controller(crawl_config(None));
    controller.connect().await.unwrap();
    let mut changes = controller.value_changes();

    controller
        .provider()
        .inner
        .push_value(&path("1.1"), Value::Integer(-60))
        .unwrap();

    let change = next_change(&mut changes).await;
    assert_eq!(
        change,
        ValueChanged {
            label: "Audio.Gain".into(),
            value: "-6".into(),
        }
    );
    assert_eq!(controller.value("Audio.Gain").as_deref(), Some("-6"));

    controller.disconnect().await;
}

#[tokio::test]
async fn test_discovery_failure_marks_session_failed() {
    let provider = Recorder::new(mixer());
    provider.inner.reject_expansion(path("1"));
    let controller = Controller::new(crawl_config(None), provider);

    let result = controller.connect().await;

    assert!(matches!(result, Err(CoreError::DiscoveryFailed { .. })));
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Failed);
    assert!(controller.registry().is_empty());
    assert!(controller.store().is_empty());
    assert!(controller.provider().inner.subscribed_paths().is_empty());
    assert!(controller.last_session().is_none());

    controller.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out() {
    let mut provider = Recorder::new(mixer());
    provider.connect_delay = Some(Duration::from_secs(60));
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(50),
        ..crawl_config(None)
    };
    let controller = Controller::new(config, provider);

    let result = controller.connect().await;

    assert!(matches!(result, Err(CoreError::Timeout { timeout_ms: 50, .. })));
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Failed);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_execute_routes_to_writer() {
    let controller = recording_controller(crawl_config(None));
    controller.connect().await.unwrap();
    let mut changes = controller.value_changes();

    let outcome = controller
        .execute(Command::Toggle {
            target: WriteTarget::Label("Audio.Mute".into()),
        })
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Written(Value::Boolean(true)));

    // The applied value comes back as a push.
    let change = next_change(&mut changes).await;
    assert_eq!(change.label, "Audio.Mute");
    assert_eq!(change.value, "true");

    let outcome = controller
        .execute(Command::SetValue {
            target: WriteTarget::Path(path("1.1")),
            value: WriteValue::Integer(100),
        })
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Written(Value::Integer(60)));

    assert_eq!(
        controller.provider().inner.written(),
        vec![
            (path("1.3"), Value::Boolean(true)),
            (path("1.1"), Value::Integer(60)),
        ]
    );

    controller.disconnect().await;
}

#[tokio::test]
async fn test_expression_uses_host_resolver() {
    let resolver = |template: &str| template.replace("$(level)", "25");
    let controller = Controller::with_resolver(crawl_config(None), mixer(), resolver);
    controller.connect().await.unwrap();

    let outcome = controller
        .execute(Command::SetExpression {
            target: WriteTarget::Label("Audio.Gain".into()),
            template: "$(level)".into(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Written(Value::Integer(25)));
    controller.disconnect().await;
}

#[tokio::test]
async fn test_execute_requires_connection() {
    let controller = recording_controller(crawl_config(None));

    let result = controller
        .execute(Command::Toggle {
            target: WriteTarget::Label("Audio.Mute".into()),
        })
        .await;

    assert!(matches!(result, Err(CoreError::ProviderDisconnected)));
}

// ── Reconnect and reconfiguration ───────────────────────────────────

#[tokio::test]
async fn test_reconnect_starts_from_empty_state() {
    let controller = recording_controller(crawl_config(None));
    controller.connect().await.unwrap();
    assert_eq!(controller.registry().len(), 4);

    controller.provider().inner.drop_connection();
    wait_for_state(&controller, ConnectionState::Connecting).await;

    controller.provider().inner.restore_connection();
    wait_for_generation(&controller, 2).await;

    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Connected);
    // Both crawls began with nothing left over from an earlier session.
    assert_eq!(controller.provider().at_root(), vec![(0, 0), (0, 0)]);
    assert_eq!(controller.registry().len(), 4);
    assert_eq!(controller.provider().inner.subscribed_paths().len(), 4);

    controller.disconnect().await;
}

#[tokio::test]
async fn test_reconfigure_rebuilds_session() {
    let controller = recording_controller(crawl_config(None));
    controller.connect().await.unwrap();

    let summary = controller
        .reconfigure(crawl_config(Some("Master")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.generation, 2);
    assert_eq!(labels(&controller), vec!["Master"]);
    assert_eq!(controller.store().len(), 1);
    assert_eq!(controller.provider().inner.subscribed_paths(), vec![path("2")]);
    assert_eq!(controller.provider().at_root(), vec![(0, 0), (0, 0)]);

    controller.disconnect().await;
}

#[tokio::test]
async fn test_reconfigure_while_disconnected_is_deferred() {
    let controller = recording_controller(crawl_config(None));

    let summary = controller
        .reconfigure(crawl_config(Some("Master")))
        .await
        .unwrap();

    assert!(summary.is_none());
    assert!(controller.config().filters.parameter_filters.contains("Master"));
}

#[tokio::test]
async fn test_disconnect_clears_session() {
    let controller = recording_controller(crawl_config(None));
    controller.connect().await.unwrap();

    controller.disconnect().await;

    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Disconnected);
    assert!(controller.registry().is_empty());
    assert!(controller.store().is_empty());
    assert!(controller.provider().inner.subscribed_paths().is_empty());
}

// ── One-shot ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_oneshot_connects_and_disconnects() {
    let monitored = Controller::oneshot(crawl_config(None), mixer(), |controller| async move {
        Ok(controller.parameters_snapshot().len())
    })
    .await
    .unwrap();

    assert_eq!(monitored, 4);
}

#[tokio::test]
async fn test_parameter_stream_sees_new_session() {
    let controller = recording_controller(crawl_config(None));
    let mut parameters = controller.parameters();

    let watcher = tokio::spawn(async move {
        let mut max_seen = 0;
        while let Some(snapshot) = parameters.changed().await {
            max_seen = max_seen.max(snapshot.len());
            if max_seen == 4 {
                break;
            }
        }
        max_seen
    });

    controller.connect().await.unwrap();
    let seen = tokio::time::timeout(WAIT, watcher).await.unwrap().unwrap();
    assert_eq!(seen, 4);

    controller.disconnect().await;
}
