//! Write handlers: set, expr, inc/dec and toggle.

use serde::Serialize;

use emberlink_core::{
    Command as CoreCommand, Controller, SkipReason, SnapshotProvider, StepDirection,
    TemplateResolver, Value, WriteOutcome, WriteTarget,
};

use crate::cli::{Command, GlobalOpts, StepArgs};
use crate::error::CliError;
use crate::output;

// ── Template variables ──────────────────────────────────────────────

/// Replaces `$(name)` placeholders with values given as `--var NAME=VALUE`.
#[derive(Debug, Default)]
pub struct VarResolver {
    vars: Vec<(String, String)>,
}

impl VarResolver {
    pub fn parse(pairs: &[String]) -> Result<Self, CliError> {
        let vars = pairs
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .filter(|(name, _)| !name.trim().is_empty())
                    .map(|(name, value)| (name.trim().to_owned(), value.to_owned()))
                    .ok_or_else(|| CliError::Validation {
                        field: "var".into(),
                        reason: format!("expected NAME=VALUE, got '{pair}'"),
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { vars })
    }
}

impl TemplateResolver for VarResolver {
    fn resolve(&self, template: &str) -> String {
        self.vars
            .iter()
            .fold(template.to_owned(), |text, (name, value)| {
                text.replace(&format!("$({name})"), value)
            })
    }
}

/// The template resolver the session should use for `cmd`.
pub fn resolver_for(cmd: &Command) -> Result<VarResolver, CliError> {
    match cmd {
        Command::Expr { vars, .. } => VarResolver::parse(vars),
        _ => Ok(VarResolver::default()),
    }
}

// ── Execution ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WriteReport {
    target: String,
    value: Value,
}

pub fn step(args: &StepArgs, direction: StepDirection) -> CoreCommand {
    CoreCommand::Step {
        target: WriteTarget::parse(&args.target),
        delta: args.delta,
        direction,
    }
}

/// Run a write and report the raw value that was sent.
pub async fn execute(
    controller: &Controller<SnapshotProvider>,
    cmd: CoreCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let target = cmd.target().to_string();

    match controller.execute(cmd).await? {
        WriteOutcome::Written(value) => {
            output::status(
                &format!("wrote {value} to {target}"),
                true,
                &global.color,
                global.quiet,
            );
            let report = WriteReport { target, value };
            let out = output::render_single(
                &global.output,
                &report,
                |r| format!("{} = {}", r.target, r.value),
                |r| r.value.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        WriteOutcome::Skipped(SkipReason::NotFound) => {
            Err(CliError::NotFound { identifier: target })
        }
        WriteOutcome::Skipped(reason) => Err(CliError::WriteSkipped {
            target,
            reason: describe(&reason),
        }),
    }
}

fn describe(reason: &SkipReason) -> String {
    match reason {
        SkipReason::NotFound => "not a parameter".into(),
        SkipReason::TypeMismatch { requested, actual } => {
            format!("parameter type is {actual}, not {requested}")
        }
        SkipReason::MissingBound => "parameter declares no bound for this operation".into(),
        SkipReason::NotNumeric => "value is not a number".into(),
        SkipReason::NotBoolean => "current value is not a boolean".into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn vars_replace_placeholders() {
        let resolver =
            VarResolver::parse(&["level=7".into(), "trim=-2".into()]).unwrap();
        assert_eq!(resolver.resolve("$(level)"), "7");
        assert_eq!(resolver.resolve("$(trim)"), "-2");
        assert_eq!(resolver.resolve("$(other)"), "$(other)");
    }

    #[test]
    fn malformed_var_is_rejected() {
        assert!(VarResolver::parse(&["level".into()]).is_err());
        assert!(VarResolver::parse(&["=3".into()]).is_err());
    }
}
