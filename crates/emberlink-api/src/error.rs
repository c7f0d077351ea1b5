use thiserror::Error;

/// Top-level error type for the `emberlink-api` crate.
///
/// Covers every failure a provider can report: connection lifecycle,
/// peer-side rejections, path addressing, and snapshot loading.
/// `emberlink-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The provider could not establish a connection to the peer.
    #[error("Cannot connect to provider at {address}: {reason}")]
    Connection { address: String, reason: String },

    /// The peer did not answer within the configured timeout.
    #[error("Timed out after {timeout_ms} ms waiting for {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A request was issued while the provider is not connected.
    #[error("Provider is not connected")]
    Disconnected,

    // ── Peer ────────────────────────────────────────────────────────
    /// The peer rejected a directory, subscribe, or set request.
    #[error("Request rejected by provider: {message}")]
    Rejected { message: String },

    /// The path does not address any element in the tree.
    #[error("No element at path {path}")]
    UnknownPath { path: String },

    // ── Addressing ──────────────────────────────────────────────────
    /// A textual path could not be parsed into numeric segments.
    #[error("Invalid path '{input}': expected numeric segments separated by '.' or '/'")]
    InvalidPath { input: String },

    // ── Snapshot ────────────────────────────────────────────────────
    /// The tree snapshot document is not valid JSON or has the wrong shape.
    #[error("Invalid tree snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The tree snapshot file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownPath { .. })
    }

    /// Returns `true` if the connection is gone and a reconnect might resolve it.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Disconnected
        )
    }
}
