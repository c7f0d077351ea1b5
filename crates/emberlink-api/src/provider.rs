// ── Provider contract ──
//
// Everything the engine needs from a protocol implementation: directory
// expansion, path resolution, value subscriptions, value writes and the
// connection lifecycle. Wire encoding lives behind this trait.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};

use crate::error::Error;
use crate::model::{QualifiedPath, TreeNode, Value};

/// A value push for a subscribed path.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterUpdate {
    pub path: QualifiedPath,
    pub node: TreeNode,
}

/// Channel on which a provider delivers pushes for subscribed paths.
///
/// One sink per session. Pushes for the same path must be sent in the
/// order the peer produced them.
pub type UpdateSink = mpsc::UnboundedSender<ParameterUpdate>;

/// Connection lifecycle signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connected,
    Disconnected,
    Error(String),
}

/// A consumer-side connection to a tree provider.
///
/// All request methods may be called concurrently, but the engine issues
/// at most one [`expand`](Self::expand) at a time per session.
pub trait Provider: Send + Sync + 'static {
    /// Human-readable peer address used in logs.
    fn address(&self) -> String;

    /// Open the connection. Emits [`ProviderEvent::Connected`] on success.
    fn connect(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Close the connection and drop every subscription.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Subscribe to lifecycle events.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;

    /// The synthetic root element (empty path).
    fn root(&self) -> TreeNode;

    /// Fetch the full child set of a container. Completes once the peer
    /// has answered the directory request.
    fn expand(&self, node: &TreeNode) -> impl Future<Output = Result<Vec<TreeNode>, Error>> + Send;

    /// Look up the current state of an element without subscribing.
    fn resolve(
        &self,
        path: &QualifiedPath,
    ) -> impl Future<Output = Result<Option<TreeNode>, Error>> + Send;

    /// Subscribe to value pushes for `path`, delivered through `sink`.
    ///
    /// Returns the element's current state, or `None` when the path does
    /// not exist. Subscribing an already subscribed path replaces its sink.
    fn subscribe(
        &self,
        path: &QualifiedPath,
        sink: UpdateSink,
    ) -> impl Future<Output = Result<Option<TreeNode>, Error>> + Send;

    fn unsubscribe(&self, path: &QualifiedPath) -> impl Future<Output = Result<(), Error>> + Send;

    /// Send a value-set command. Does not wait for the peer to apply it;
    /// the applied value arrives later as a push.
    fn write(
        &self,
        node: &TreeNode,
        value: Value,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}
