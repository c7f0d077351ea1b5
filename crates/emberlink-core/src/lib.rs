//! Discovery and monitoring engine between `emberlink-api` and its hosts.
//!
//! This crate owns the session logic for one provider connection:
//!
//! - **[`Controller`]**: central facade managing the full lifecycle:
//!   [`connect()`](Controller::connect) builds the first session, a
//!   background task rebuilds it on every reconnect, and
//!   [`Controller::oneshot()`](Controller::oneshot) runs a single
//!   connect/act/disconnect cycle for CLI invocations.
//!
//! - **Discovery**: [`FilterRules`] compiled from [`RawFilters`] steer the
//!   depth-first [`TreeCrawler`], which registers accepted parameters in the
//!   bounded [`ParameterRegistry`].
//!
//! - **Monitoring**: [`SubscriptionManager`] keeps one subscription per
//!   registered path, [`decode()`] turns raw values into display text, and
//!   the [`StateStore`] holds the latest text per label.
//!
//! - **[`Command`]**: write requests routed through an `mpsc` channel to
//!   the controller's command processor, which runs them through the
//!   bound-checking [`ValueWriter`].

pub mod command;
pub mod config;
pub mod controller;
pub mod crawler;
pub mod decode;
pub mod error;
pub mod filter;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::Command;
pub use config::SessionConfig;
pub use controller::{ConnectionState, Controller, SessionSummary};
pub use crawler::{CrawlReport, TreeCrawler};
pub use decode::decode;
pub use error::CoreError;
pub use filter::{AutoParseRule, FilterRules, RawFilters};
pub use store::{
    MAX_MONITORED_PARAMETERS, MonitoredParameter, ParameterRegistry, Registration, StateStore,
};
pub use stream::ParameterStream;
pub use subscription::{SubscribeReport, SubscriptionManager, ValueChanged};
pub use writer::{
    SkipReason, StepDirection, TemplateResolver, ValueWriter, Verbatim, WriteOutcome,
    WriteTarget, WriteValue,
};

// Provider-side types every host needs alongside the engine.
pub use emberlink_api::{Provider, QualifiedPath, SnapshotProvider, Value};
