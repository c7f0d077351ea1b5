// ── Core error types ──
//
// Session-level errors from emberlink-core. Consumers never see raw
// provider errors; the `From<emberlink_api::Error>` impl translates them
// into domain-appropriate variants.
//
// Per-parameter problems (unknown path, kind mismatch, capacity) are not
// errors here: they are logged and reported as skipped outcomes.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to provider at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Timed out waiting for {operation} ({timeout_ms} ms)")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Provider disconnected")]
    ProviderDisconnected,

    // ── Discovery errors ─────────────────────────────────────────────
    #[error("Tree discovery failed at '{path}': {reason}")]
    DiscoveryFailed { path: String, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Parameter not found: {identifier}")]
    ParameterNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request rejected by provider: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from provider errors ──────────────────────────────────

impl From<emberlink_api::Error> for CoreError {
    fn from(err: emberlink_api::Error) -> Self {
        match err {
            emberlink_api::Error::Connection { address, reason } => {
                CoreError::ConnectionFailed { address, reason }
            }
            emberlink_api::Error::Timeout {
                operation,
                timeout_ms,
            } => CoreError::Timeout {
                operation,
                timeout_ms,
            },
            emberlink_api::Error::Disconnected => CoreError::ProviderDisconnected,
            emberlink_api::Error::Rejected { message } => CoreError::Rejected { message },
            emberlink_api::Error::UnknownPath { path } => {
                CoreError::ParameterNotFound { identifier: path }
            }
            emberlink_api::Error::InvalidPath { input } => CoreError::ValidationFailed {
                message: format!("invalid path '{input}'"),
            },
            emberlink_api::Error::Snapshot(e) => CoreError::Config {
                message: format!("invalid tree snapshot: {e}"),
            },
            emberlink_api::Error::Io(e) => CoreError::Internal(format!("IO error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_maps_to_parameter_not_found() {
        let err = CoreError::from(emberlink_api::Error::UnknownPath {
            path: "1.2".into(),
        });
        assert!(matches!(err, CoreError::ParameterNotFound { identifier } if identifier == "1.2"));
    }

    #[test]
    fn disconnected_maps_to_provider_disconnected() {
        let err = CoreError::from(emberlink_api::Error::Disconnected);
        assert!(matches!(err, CoreError::ProviderDisconnected));
    }
}
