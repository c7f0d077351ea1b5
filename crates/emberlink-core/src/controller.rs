// ── Controller abstraction ──
//
// Full lifecycle management for a provider connection. One session
// (crawl plus subscriptions) runs per connection-established event; a
// disconnect or reconfiguration tears the session down completely before
// the next one is built. Writes are routed through a command channel.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use emberlink_api::{ParameterUpdate, Provider, ProviderEvent};

use crate::command::{Command, CommandEnvelope};
use crate::config::SessionConfig;
use crate::crawler::{CrawlReport, TreeCrawler};
use crate::error::CoreError;
use crate::store::{MonitoredParameter, ParameterRegistry, Registration, StateStore};
use crate::stream::ParameterStream;
use crate::subscription::{SubscribeReport, SubscriptionManager, ValueChanged};
use crate::writer::{TemplateResolver, ValueWriter, Verbatim, WriteOutcome};

const COMMAND_CHANNEL_SIZE: usize = 64;
const CHANGE_CHANNEL_SIZE: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers. The only health signal
/// the controller surfaces; per-parameter failures are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What the most recent session start produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Increments with every successfully built session.
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub crawl: CrawlReport,
    pub subscriptions: SubscribeReport,
    /// Registry size once the session was established.
    pub monitored: usize,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Manages the session
/// lifecycle, command routing, and value-change broadcasting for one
/// provider.
pub struct Controller<P: Provider> {
    inner: Arc<ControllerInner<P>>,
}

impl<P: Provider> Clone for Controller<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<P: Provider> {
    provider: Arc<P>,
    config: ArcSwap<SessionConfig>,
    registry: Arc<ParameterRegistry>,
    store: Arc<StateStore>,
    subscriptions: Arc<SubscriptionManager>,
    resolver: Arc<dyn TemplateResolver>,
    connection_state: watch::Sender<ConnectionState>,
    change_tx: broadcast::Sender<ValueChanged>,
    last_session: watch::Sender<Option<SessionSummary>>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current connection, cancelled on disconnect
    /// and replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    /// Tasks of the running session. The lock also serializes session
    /// start and teardown.
    session: Mutex<SessionTasks>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct SessionTasks {
    cancel: CancellationToken,
    decoder: Option<JoinHandle<()>>,
}

impl<P: Provider> Controller<P> {
    /// Create a controller that passes templates through unchanged.
    /// Does NOT connect; call [`connect()`](Self::connect).
    pub fn new(config: SessionConfig, provider: P) -> Self {
        Self::with_resolver(config, provider, Verbatim)
    }

    /// Create a controller with a host-supplied template resolver for
    /// [`Command::SetExpression`].
    pub fn with_resolver(
        config: SessionConfig,
        provider: P,
        resolver: impl TemplateResolver + 'static,
    ) -> Self {
        let store = Arc::new(StateStore::new());
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        let (last_session, _) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let session_cancel = cancel_child.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                provider: Arc::new(provider),
                config: ArcSwap::from_pointee(config),
                registry: Arc::new(ParameterRegistry::new()),
                subscriptions: Arc::new(SubscriptionManager::new(
                    Arc::clone(&store),
                    change_tx.clone(),
                )),
                store,
                resolver: Arc::new(resolver),
                connection_state,
                change_tx,
                last_session,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                session: Mutex::new(SessionTasks {
                    cancel: session_cancel,
                    decoder: None,
                }),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The configuration the next session will be built from.
    pub fn config(&self) -> Arc<SessionConfig> {
        self.inner.config.load_full()
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.inner.provider
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the provider and build the first session.
    ///
    /// Spawns the command processor and the lifecycle task, which
    /// rebuilds the session on every later connection-established event.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);

        // Fresh child token for this connection (supports reconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let config = self.config();
        let address = self.inner.provider.address();
        info!(address = %address, "connecting to provider");

        match tokio::time::timeout(config.connect_timeout, self.inner.provider.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = self.inner.connection_state.send(ConnectionState::Failed);
                error!(address = %address, error = %e, "connection failed");
                return Err(e.into());
            }
            Err(_) => {
                let _ = self.inner.connection_state.send(ConnectionState::Failed);
                error!(address = %address, "connection timed out");
                return Err(CoreError::Timeout {
                    operation: format!("connection to {address}"),
                    timeout_ms: u64::try_from(config.connect_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                });
            }
        }

        // Subscribed after connecting: the initial connected event is
        // answered right here, later ones by the lifecycle task.
        let events = self.inner.provider.events();

        {
            let mut handles = self.inner.task_handles.lock().await;
            if let Some(rx) = self.inner.command_rx.lock().await.take() {
                let ctrl = self.clone();
                handles.push(tokio::spawn(command_processor_task(ctrl, rx)));
            }
            let ctrl = self.clone();
            handles.push(tokio::spawn(lifecycle_task(ctrl, events, child)));
        }

        self.restart_session().await.map(|_| ())
    }

    /// Disconnect from the provider.
    ///
    /// Cancels background tasks, tears the session down and resets the
    /// connection state to [`Disconnected`](ConnectionState::Disconnected).
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent, so reconnect stays possible).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.end_session().await;
        self.inner.provider.disconnect().await;

        // Recreate command channel so reconnects can spawn a fresh receiver.
        // The previous receiver is consumed by the command processor task.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Replace the configuration and rebuild the session from scratch.
    ///
    /// Returns `None` when no connection is up; the new configuration is
    /// used by the next session.
    pub async fn reconfigure(
        &self,
        config: SessionConfig,
    ) -> Result<Option<SessionSummary>, CoreError> {
        self.inner.config.store(Arc::new(config));
        info!("configuration updated");

        let state = *self.inner.connection_state.borrow();
        match state {
            ConnectionState::Connected | ConnectionState::Failed => {
                self.restart_session().await.map(Some)
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => Ok(None),
        }
    }

    // ── Session ──────────────────────────────────────────────────

    /// Tear down the current session and build a new one: crawl (when
    /// auto-parse is on), register explicit parameters, subscribe all.
    ///
    /// A failed directory request aborts the session and moves the
    /// connection state to [`Failed`](ConnectionState::Failed).
    pub async fn restart_session(&self) -> Result<SessionSummary, CoreError> {
        let mut session = self.inner.session.lock().await;
        self.teardown(&mut session).await;

        let config = self.config();
        let started_at = Utc::now();

        session.cancel = self.inner.cancel_child.lock().await.child_token();
        let (sink, rx) = mpsc::unbounded_channel();
        session.decoder = Some(tokio::spawn(decode_task(
            Arc::clone(&self.inner.subscriptions),
            rx,
            session.cancel.clone(),
        )));

        info!(
            auto_parse = config.auto_parse,
            explicit = config.monitored.len(),
            "starting session"
        );

        let crawl = if config.auto_parse {
            let crawler = TreeCrawler::new(
                self.inner.provider.as_ref(),
                &config.filters,
                &self.inner.registry,
            );
            match crawler.crawl().await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "failed to discover provider tree");
                    self.teardown(&mut session).await;
                    let _ = self.inner.connection_state.send(ConnectionState::Failed);
                    return Err(e);
                }
            }
        } else {
            CrawlReport::default()
        };

        for parameter in &config.monitored {
            let outcome = self
                .inner
                .registry
                .register(parameter.path.clone(), parameter.label.clone());
            if outcome == Registration::AtCapacity {
                warn!(path = %parameter.path, "registry full, explicit parameter not monitored");
            }
        }

        let subscriptions = self
            .inner
            .subscriptions
            .subscribe_all(self.inner.provider.as_ref(), &self.inner.registry, &sink)
            .await;

        let generation = self
            .inner
            .last_session
            .borrow()
            .as_ref()
            .map_or(1, |s| s.generation + 1);
        let summary = SessionSummary {
            generation,
            started_at,
            crawl,
            subscriptions,
            monitored: self.inner.registry.len(),
        };

        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        info!(
            monitored = summary.monitored,
            subscribed = subscriptions.subscribed,
            failed = subscriptions.failed,
            "session established"
        );
        self.inner.last_session.send_replace(Some(summary.clone()));
        Ok(summary)
    }

    async fn end_session(&self) {
        let mut session = self.inner.session.lock().await;
        self.teardown(&mut session).await;
    }

    /// Stop the decoder, drop every subscription and empty the registry
    /// and the state store.
    async fn teardown(&self, session: &mut SessionTasks) {
        session.cancel.cancel();
        if let Some(handle) = session.decoder.take() {
            let _ = handle.await;
        }
        self.inner
            .subscriptions
            .unsubscribe_all(self.inner.provider.as_ref())
            .await;
        self.inner.registry.clear();
        self.inner.store.clear();
        debug!("session torn down");
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a write command.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<WriteOutcome, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::ProviderDisconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ProviderDisconnected)?;

        rx.await.map_err(|_| CoreError::ProviderDisconnected)?
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    pub async fn oneshot<F, Fut, T>(
        config: SessionConfig,
        provider: P,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller<P>) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let controller = Controller::new(config, provider);
        if let Err(e) = controller.connect().await {
            controller.disconnect().await;
            return Err(e);
        }
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to per-label value changes.
    pub fn value_changes(&self) -> broadcast::Receiver<ValueChanged> {
        self.inner.change_tx.subscribe()
    }

    /// Subscribe to session summaries; a new one is published every
    /// time a session is established.
    pub fn sessions(&self) -> watch::Receiver<Option<SessionSummary>> {
        self.inner.last_session.subscribe()
    }

    pub fn last_session(&self) -> Option<SessionSummary> {
        self.inner.last_session.borrow().clone()
    }

    /// Reactive view of the monitored parameters.
    pub fn parameters(&self) -> ParameterStream {
        ParameterStream::new(self.inner.registry.subscribe())
    }

    pub fn parameters_snapshot(&self) -> Arc<Vec<Arc<MonitoredParameter>>> {
        self.inner.registry.entries()
    }

    /// Latest decoded value for `label`.
    pub fn value(&self, label: &str) -> Option<String> {
        self.inner.store.get(label)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Rebuild the session on reconnect, tear it down on link loss.
async fn lifecycle_task<P: Provider>(
    controller: Controller<P>,
    mut events: broadcast::Receiver<ProviderEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(ProviderEvent::Connected) => {
                    info!("provider connected, rebuilding session");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        result = controller.restart_session() => {
                            if let Err(e) = result {
                                warn!(error = %e, "session rebuild failed");
                            }
                        }
                    }
                }
                Ok(ProviderEvent::Disconnected) => {
                    warn!("provider disconnected");
                    let _ = controller
                        .inner
                        .connection_state
                        .send(ConnectionState::Connecting);
                    controller.end_session().await;
                }
                Ok(ProviderEvent::Error(message)) => {
                    error!(error = %message, "provider error");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Decode pushes in arrival order for the lifetime of one session.
async fn decode_task(
    subscriptions: Arc<SubscriptionManager>,
    mut rx: mpsc::UnboundedReceiver<ParameterUpdate>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            update = rx.recv() => {
                let Some(update) = update else { break };
                subscriptions.handle_update(&update);
            }
        }
    }
}

async fn command_processor_task<P: Provider>(
    controller: Controller<P>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
) {
    let cancel = controller.inner.cancel_child.lock().await.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command<P: Provider>(
    controller: &Controller<P>,
    cmd: Command,
) -> Result<WriteOutcome, CoreError> {
    let inner = &controller.inner;
    let writer = ValueWriter::new(inner.provider.as_ref(), &inner.registry);

    match cmd {
        Command::SetValue { target, value } => writer.set_absolute(&target, value).await,
        Command::SetExpression { target, template } => {
            writer
                .set_expression(&target, &template, inner.resolver.as_ref())
                .await
        }
        Command::Step {
            target,
            delta,
            direction,
        } => writer.step(&target, delta, direction).await,
        Command::Toggle { target } => writer.toggle(&target).await,
    }
}
