use anyhow::{anyhow, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table};
use fleetpush_core::{settings, BatchReport, Variable};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::{require_template, AppState};

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[arg(long, short, default_value = "cmliu")]
    pub template: String,
    /// Override a stored variable as `KEY=VALUE` for this and later runs. Repeatable.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Runs one batch. Returns the report so the caller can pick an exit status.
pub async fn handle_deploy_command(
    args: DeployArgs,
    state: &AppState,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    let template = require_template(&args.template)?;
    let overrides = parse_overrides(&args.vars)?;

    let mut variables = state.settings(template).await?;
    for variable in &overrides {
        settings::upsert_variable(&mut variables, &variable.key, &variable.value);
    }
    state.save_settings(template, &variables).await?;
    info!(template = template.id, variables = variables.len(), "Variables saved");

    let report = state.deploy(template.id, variables, cancel).await;
    if report.cancelled {
        warn!(template = template.id, "Deployment interrupted");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
        println!(
            "{} succeeded, {} failed{}",
            report.succeeded(),
            report.failed(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
    }
    Ok(report)
}

fn parse_overrides(assignments: &[String]) -> Result<Vec<Variable>> {
    assignments
        .iter()
        .map(|raw| {
            settings::parse_assignment(raw).ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))
        })
        .collect()
}

pub fn render_report(report: &BatchReport) -> Table {
    let mut table = super::table(["Target", "Result", "Kind", "Message"]);
    for entry in &report.entries {
        let result = if entry.kind.is_informational() {
            Cell::new("notice").fg(Color::Yellow)
        } else if entry.success {
            Cell::new("ok").fg(Color::Green)
        } else {
            Cell::new("failed").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&entry.label),
            result,
            Cell::new(entry.kind),
            Cell::new(&entry.message),
        ]);
    }
    table
}
