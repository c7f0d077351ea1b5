//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use emberlink_config::ConfigError;
use emberlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to provider at {address}")]
    #[diagnostic(
        code(emberlink::connection_failed),
        help("Check that the provider is reachable.\nReason: {reason}")
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Provider connection was lost")]
    #[diagnostic(code(emberlink::disconnected))]
    Disconnected,

    #[error("Tree discovery failed at {path}: {reason}")]
    #[diagnostic(
        code(emberlink::discovery_failed),
        help(
            "The provider refused a directory request, so the session was abandoned.\n\
             Narrow the crawl with --auto-parse-paths to skip the failing branch."
        )
    )]
    DiscoveryFailed { path: String, reason: String },

    #[error("Timed out after {timeout_ms} ms waiting for {operation}")]
    #[diagnostic(
        code(emberlink::timeout),
        help("Increase the timeout with --timeout or check provider responsiveness.")
    )]
    Timeout { operation: String, timeout_ms: u64 },

    // ── Parameters ───────────────────────────────────────────────────

    #[error("Parameter '{identifier}' not found")]
    #[diagnostic(
        code(emberlink::not_found),
        help("Run: emberlink crawl to see the monitored parameters")
    )]
    NotFound { identifier: String },

    #[error("Write to '{target}' was not issued: {reason}")]
    #[diagnostic(code(emberlink::write_skipped))]
    WriteSkipped { target: String, reason: String },

    #[error("Provider rejected the request: {message}")]
    #[diagnostic(code(emberlink::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(emberlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(emberlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: emberlink config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No provider tree configured")]
    #[diagnostic(
        code(emberlink::no_tree),
        help(
            "Pass a JSON tree snapshot with --tree <file>, or set `tree` in your profile.\n\
             Config file: {path}"
        )
    )]
    NoTree { path: String },

    #[error("Could not load tree snapshot {path}: {reason}")]
    #[diagnostic(code(emberlink::tree))]
    Tree { path: String, reason: String },

    #[error("{0}")]
    #[diagnostic(code(emberlink::config))]
    Config(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(emberlink::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected | Self::DiscoveryFailed { .. } => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. }
            | Self::NoTree { .. }
            | Self::Tree { .. }
            | Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::ProviderDisconnected => CliError::Disconnected,
            CoreError::Timeout {
                operation,
                timeout_ms,
            } => CliError::Timeout {
                operation,
                timeout_ms,
            },
            CoreError::DiscoveryFailed { path, reason } => {
                CliError::DiscoveryFailed { path, reason }
            }
            CoreError::ParameterNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::Rejected { message } => CliError::Rejected { message },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Config(message),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
