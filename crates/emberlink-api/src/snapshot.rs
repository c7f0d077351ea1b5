//! In-memory provider backed by a JSON tree document.
//!
//! Serves a captured device tree without a network peer: directory
//! requests answer from the document, writes are applied in place and
//! echoed to subscribers the way a live peer confirms a set command.
//! Used by the CLI for offline runs and by tests as the provider double.
//!
//! # Document format
//!
//! ```json
//! {
//!   "address": "studio-mixer:9000",
//!   "nodes": [
//!     { "number": 1, "identifier": "Audio", "children": [
//!       { "number": 1, "identifier": "Gain", "type": "integer",
//!         "value": -120, "minimum": -640, "maximum": 60, "factor": 10 },
//!       { "number": 2, "identifier": "Mode", "type": "enum",
//!         "value": 1, "enumeration": "Off\nOn\nAuto" }
//!     ]}
//!   ]
//! }
//! ```
//!
//! A node with a `type` is a parameter, anything else is a container.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::Error;
use crate::model::{
    ElementContents, NodeContents, ParameterContents, ParameterKind, QualifiedPath, TreeNode,
    Value, enumeration_from_text,
};
use crate::provider::{ParameterUpdate, Provider, ProviderEvent, UpdateSink};

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── Document ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    nodes: Vec<NodeDocument>,
}

#[derive(Debug, Deserialize)]
struct NodeDocument {
    number: u32,
    identifier: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<ParameterKind>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    minimum: Option<Value>,
    #[serde(default)]
    maximum: Option<Value>,
    #[serde(default)]
    factor: Option<i64>,
    #[serde(default)]
    enumeration: Option<EnumerationDocument>,
    #[serde(default)]
    children: Vec<NodeDocument>,
}

/// Enumerations are accepted as the protocol's newline-delimited text
/// or as a plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnumerationDocument {
    Text(String),
    Labels(Vec<String>),
}

impl NodeDocument {
    fn into_element(self, path: QualifiedPath) -> (TreeNode, Vec<NodeDocument>) {
        let node = match self.kind {
            Some(kind) => TreeNode::parameter(
                path,
                ParameterContents {
                    identifier: self.identifier,
                    description: self.description,
                    kind,
                    value: self.value,
                    minimum: self.minimum,
                    maximum: self.maximum,
                    factor: self.factor,
                    enumeration: self.enumeration.map(|e| match e {
                        EnumerationDocument::Text(text) => enumeration_from_text(&text),
                        EnumerationDocument::Labels(labels) => labels,
                    }),
                },
            ),
            None => TreeNode {
                path,
                contents: ElementContents::Node(NodeContents {
                    identifier: self.identifier,
                    description: self.description,
                }),
            },
        };
        (node, self.children)
    }
}

// ── SnapshotProvider ─────────────────────────────────────────────────

/// A [`Provider`] serving a fixed tree from memory.
pub struct SnapshotProvider {
    address: String,
    elements: RwLock<BTreeMap<QualifiedPath, TreeNode>>,
    /// Child paths per container, in document order. The root's entry
    /// lists the top-level elements.
    children: BTreeMap<QualifiedPath, Vec<QualifiedPath>>,
    subscriptions: Mutex<HashMap<QualifiedPath, UpdateSink>>,
    rejected_expansions: Mutex<HashSet<QualifiedPath>>,
    rejected_subscriptions: Mutex<HashSet<QualifiedPath>>,
    writes: Mutex<Vec<(QualifiedPath, Value)>>,
    expansions: AtomicUsize,
    connected: AtomicBool,
    events: broadcast::Sender<ProviderEvent>,
}

impl SnapshotProvider {
    /// Parse a snapshot document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let document: SnapshotDocument = serde_json::from_str(text)?;
        Ok(Self::from_document(document))
    }

    /// Build a snapshot from an already parsed JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, Error> {
        let document: SnapshotDocument = serde_json::from_value(value)?;
        Ok(Self::from_document(document))
    }

    /// Load a snapshot document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    fn from_document(document: SnapshotDocument) -> Self {
        let mut elements = BTreeMap::new();
        let mut children = BTreeMap::new();
        let root = QualifiedPath::root();
        let top_level = insert_children(&root, document.nodes, &mut elements, &mut children);
        children.insert(root, top_level);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            address: document.address.unwrap_or_else(|| "snapshot".into()),
            elements: RwLock::new(elements),
            children,
            subscriptions: Mutex::new(HashMap::new()),
            rejected_expansions: Mutex::new(HashSet::new()),
            rejected_subscriptions: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
            expansions: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
            events,
        }
    }

    // ── Peer simulation ──────────────────────────────────────────────

    /// Make every later directory request for `path` fail, the way a peer
    /// rejects a request it cannot serve.
    pub fn reject_expansion(&self, path: QualifiedPath) {
        self.rejected_expansions
            .lock()
            .expect("snapshot lock poisoned")
            .insert(path);
    }

    /// Make every later subscribe request for `path` fail.
    pub fn reject_subscription(&self, path: QualifiedPath) {
        self.rejected_subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .insert(path);
    }

    /// Change a parameter value on the peer side and push it to the
    /// subscriber, if any.
    pub fn push_value(&self, path: &QualifiedPath, value: Value) -> Result<(), Error> {
        let node = self.apply_value(path, value)?;
        self.notify(node);
        Ok(())
    }

    /// Simulate losing the link: subscriptions are dropped and
    /// [`ProviderEvent::Disconnected`] is emitted.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .clear();
        let _ = self.events.send(ProviderEvent::Disconnected);
    }

    /// Simulate the link coming back after [`drop_connection`](Self::drop_connection).
    pub fn restore_connection(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(ProviderEvent::Connected);
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Every set command received so far, in arrival order.
    pub fn written(&self) -> Vec<(QualifiedPath, Value)> {
        self.writes.lock().expect("snapshot lock poisoned").clone()
    }

    /// Number of directory requests served.
    pub fn expansion_count(&self) -> usize {
        self.expansions.load(Ordering::SeqCst)
    }

    /// Paths that currently have a subscriber.
    pub fn subscribed_paths(&self) -> Vec<QualifiedPath> {
        let mut paths: Vec<_> = self
            .subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Current state of an element.
    pub fn element(&self, path: &QualifiedPath) -> Option<TreeNode> {
        self.elements
            .read()
            .expect("snapshot lock poisoned")
            .get(path)
            .cloned()
    }

    /// Total number of elements in the snapshot, containers included.
    pub fn element_count(&self) -> usize {
        self.elements.read().expect("snapshot lock poisoned").len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Disconnected)
        }
    }

    fn apply_value(&self, path: &QualifiedPath, value: Value) -> Result<TreeNode, Error> {
        let mut elements = self.elements.write().expect("snapshot lock poisoned");
        let node = elements.get_mut(path).ok_or_else(|| Error::UnknownPath {
            path: path.to_string(),
        })?;
        let Some(parameter) = node.as_parameter_mut() else {
            return Err(Error::Rejected {
                message: format!("{path} is not a parameter"),
            });
        };
        parameter.value = Some(value);
        Ok(node.clone())
    }

    fn notify(&self, node: TreeNode) {
        let subscriptions = self.subscriptions.lock().expect("snapshot lock poisoned");
        if let Some(sink) = subscriptions.get(&node.path) {
            trace!(path = %node.path, "pushing value to subscriber");
            let _ = sink.send(ParameterUpdate {
                path: node.path.clone(),
                node,
            });
        }
    }
}

fn insert_children(
    parent: &QualifiedPath,
    documents: Vec<NodeDocument>,
    elements: &mut BTreeMap<QualifiedPath, TreeNode>,
    children: &mut BTreeMap<QualifiedPath, Vec<QualifiedPath>>,
) -> Vec<QualifiedPath> {
    let mut paths = Vec::with_capacity(documents.len());
    for document in documents {
        let path = parent.child(document.number);
        let (node, nested) = document.into_element(path.clone());
        if node.is_container() {
            let nested_paths = insert_children(&path, nested, elements, children);
            children.insert(path.clone(), nested_paths);
        }
        elements.insert(path.clone(), node);
        paths.push(path);
    }
    paths
}

impl Provider for SnapshotProvider {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn connect(&self) -> Result<(), Error> {
        self.connected.store(true, Ordering::SeqCst);
        debug!(address = %self.address, "snapshot provider connected");
        let _ = self.events.send(ProviderEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .clear();
        let _ = self.events.send(ProviderEvent::Disconnected);
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn root(&self) -> TreeNode {
        TreeNode::node(QualifiedPath::root(), "")
    }

    async fn expand(&self, node: &TreeNode) -> Result<Vec<TreeNode>, Error> {
        self.ensure_connected()?;
        self.expansions.fetch_add(1, Ordering::SeqCst);

        if self
            .rejected_expansions
            .lock()
            .expect("snapshot lock poisoned")
            .contains(&node.path)
        {
            return Err(Error::Rejected {
                message: format!("directory request for '{}' refused", node.path),
            });
        }

        let Some(child_paths) = self.children.get(&node.path) else {
            return Err(Error::UnknownPath {
                path: node.path.to_string(),
            });
        };

        let elements = self.elements.read().expect("snapshot lock poisoned");
        let expanded: Vec<TreeNode> = child_paths
            .iter()
            .filter_map(|path| elements.get(path).cloned())
            .collect();
        trace!(path = %node.path, children = expanded.len(), "served directory request");
        Ok(expanded)
    }

    async fn resolve(&self, path: &QualifiedPath) -> Result<Option<TreeNode>, Error> {
        self.ensure_connected()?;
        Ok(self.element(path))
    }

    async fn subscribe(
        &self,
        path: &QualifiedPath,
        sink: UpdateSink,
    ) -> Result<Option<TreeNode>, Error> {
        self.ensure_connected()?;
        if self
            .rejected_subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .contains(path)
        {
            return Err(Error::Rejected {
                message: format!("subscription to '{path}' refused"),
            });
        }
        let Some(node) = self.element(path) else {
            return Ok(None);
        };
        self.subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .insert(path.clone(), sink);
        Ok(Some(node))
    }

    async fn unsubscribe(&self, path: &QualifiedPath) -> Result<(), Error> {
        self.subscriptions
            .lock()
            .expect("snapshot lock poisoned")
            .remove(path);
        Ok(())
    }

    async fn write(&self, node: &TreeNode, value: Value) -> Result<(), Error> {
        self.ensure_connected()?;
        self.writes
            .lock()
            .expect("snapshot lock poisoned")
            .push((node.path.clone(), value.clone()));
        let updated = self.apply_value(&node.path, value)?;
        self.notify(updated);
        Ok(())
    }
}
