//! Crawl and read handlers.

use serde::Serialize;
use tabled::Tabled;

use emberlink_core::{Controller, SnapshotProvider};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

/// A monitored parameter with its latest decoded value.
#[derive(Debug, Serialize)]
struct ParameterEntry {
    label: String,
    path: String,
    value: Option<String>,
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&ParameterEntry> for ParameterRow {
    fn from(p: &ParameterEntry) -> Self {
        Self {
            label: p.label.clone(),
            path: p.path.clone(),
            value: p.value.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ValueEntry {
    label: String,
    value: String,
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller<SnapshotProvider>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entries: Vec<ParameterEntry> = controller
        .parameters_snapshot()
        .iter()
        .map(|p| ParameterEntry {
            label: p.label.clone(),
            path: p.path.to_string(),
            value: controller.value(&p.label),
        })
        .collect();

    if let Some(summary) = controller.last_session() {
        output::status(
            &format!(
                "{} parameters monitored ({} containers expanded, {} pruned)",
                summary.monitored, summary.crawl.expanded, summary.crawl.pruned
            ),
            true,
            &global.color,
            global.quiet,
        );
    }

    let out = output::render_list(
        &global.output,
        &entries,
        |p| ParameterRow::from(p),
        |p| p.label.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn get(
    controller: &Controller<SnapshotProvider>,
    label: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let value = controller.value(label).ok_or_else(|| CliError::NotFound {
        identifier: label.into(),
    })?;
    let entry = ValueEntry {
        label: label.into(),
        value,
    };

    let out = output::render_single(
        &global.output,
        &entry,
        |e| format!("{} = {}", e.label, e.value),
        |e| e.value.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
