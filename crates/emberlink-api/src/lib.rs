//! Provider-side contract for Ember+-style parameter trees.
//!
//! - **[`Provider`]**: the primitives a protocol implementation exposes:
//!   directory expansion, path resolution, value subscriptions, value
//!   writes, and connection lifecycle events.
//! - **Tree model** ([`model`]): [`TreeNode`], [`QualifiedPath`],
//!   [`ParameterContents`] and the raw [`Value`] type.
//! - **[`SnapshotProvider`]**: an in-memory provider serving a tree
//!   captured as JSON, for offline runs and tests.

pub mod error;
pub mod model;
pub mod provider;
pub mod snapshot;

pub use error::Error;
pub use model::{
    ElementContents, NodeContents, ParameterContents, ParameterKind, QualifiedPath, TreeNode,
    Value, enumeration_from_text,
};
pub use provider::{ParameterUpdate, Provider, ProviderEvent, UpdateSink};
pub use snapshot::SnapshotProvider;
