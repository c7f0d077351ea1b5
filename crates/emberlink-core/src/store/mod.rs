// ── Session stores ──
//
// Shared state of a running session: the monitored-parameter registry
// and the decoded value store. Both are cleared on every session reset.

mod registry;
mod state;

pub use registry::{MAX_MONITORED_PARAMETERS, MonitoredParameter, ParameterRegistry, Registration};
pub use state::StateStore;
