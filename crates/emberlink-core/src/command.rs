// ── Command API ──
//
// All writes flow through a unified `Command` enum. The controller's
// command processor routes each variant to the matching `ValueWriter`
// operation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::writer::{StepDirection, WriteOutcome, WriteTarget, WriteValue};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<WriteOutcome, CoreError>>,
}

/// All write operations against a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Write a typed value, clamped for bounded integers.
    SetValue {
        target: WriteTarget,
        value: WriteValue,
    },
    /// Resolve a template to a number and write it within the bounds.
    SetExpression {
        target: WriteTarget,
        template: String,
    },
    /// Move a numeric value towards one of its bounds.
    Step {
        target: WriteTarget,
        delta: f64,
        direction: StepDirection,
    },
    /// Flip a boolean value.
    Toggle { target: WriteTarget },
}

impl Command {
    pub fn target(&self) -> &WriteTarget {
        match self {
            Self::SetValue { target, .. }
            | Self::SetExpression { target, .. }
            | Self::Step { target, .. }
            | Self::Toggle { target } => target,
        }
    }
}
