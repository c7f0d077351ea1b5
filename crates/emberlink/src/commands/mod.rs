//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod crawl;
pub mod write;

use emberlink_core::{
    Command as CoreCommand, Controller, SnapshotProvider, StepDirection, WriteTarget, WriteValue,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller<SnapshotProvider>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Crawl => crawl::handle(controller, global),
        Command::Get { label } => crawl::get(controller, &label, global),
        Command::Set {
            target,
            value,
            kind,
        } => {
            let value = WriteValue::parse(kind.into(), &value)?;
            let cmd = CoreCommand::SetValue {
                target: WriteTarget::parse(&target),
                value,
            };
            write::execute(controller, cmd, global).await
        }
        Command::Expr {
            target, template, ..
        } => {
            let cmd = CoreCommand::SetExpression {
                target: WriteTarget::parse(&target),
                template,
            };
            write::execute(controller, cmd, global).await
        }
        Command::Inc(args) => {
            write::execute(controller, write::step(&args, StepDirection::Increment), global).await
        }
        Command::Dec(args) => {
            write::execute(controller, write::step(&args, StepDirection::Decrement), global).await
        }
        Command::Toggle { target } => {
            let cmd = CoreCommand::Toggle {
                target: WriteTarget::parse(&target),
            };
            write::execute(controller, cmd, global).await
        }
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
