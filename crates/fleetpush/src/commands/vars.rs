use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use comfy_table::Table;
use fleetpush_core::{settings, TemplateConfig, Variable};

use crate::state::{require_template, AppState};

#[derive(Args, Debug)]
pub struct VarsArgs {
    #[arg(long, short, default_value = "cmliu")]
    pub template: String,
    #[command(subcommand)]
    pub command: VarsCommand,
}

#[derive(Subcommand, Debug)]
pub enum VarsCommand {
    /// Print the stored variable set, with defaults filled in
    Show,
    /// Set a variable from `KEY=VALUE`
    Set { assignment: String },
    /// Remove a custom variable
    Unset { key: String },
    /// Discard stored values and start from the template defaults
    Reset,
    /// Generate a new identity value for the template
    RefreshId,
}

pub async fn handle_vars_command(args: VarsArgs, state: &AppState) -> Result<()> {
    let template = require_template(&args.template)?;
    let mut variables = state.settings(template).await?;

    match args.command {
        VarsCommand::Show => {
            println!("{}", render_variables(template, &variables));
            return Ok(());
        }
        VarsCommand::Set { assignment } => {
            let variable = settings::parse_assignment(&assignment)
                .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{assignment}'"))?;
            settings::upsert_variable(&mut variables, &variable.key, &variable.value);
        }
        VarsCommand::Unset { key } => {
            if template.is_default_variable(&key) {
                bail!("'{key}' is a default variable of '{}'; set it to an empty value instead", template.id);
            }
            if !settings::remove_variable(&mut variables, &key) {
                bail!("no variable named '{key}'");
            }
        }
        VarsCommand::Reset => variables = settings::reset_variables(template),
        VarsCommand::RefreshId => {
            settings::refresh_identity(template, &mut variables);
        }
    }

    state.save_settings(template, &variables).await?;
    println!("{}", render_variables(template, &variables));
    Ok(())
}

pub fn render_variables(template: &TemplateConfig, variables: &[Variable]) -> Table {
    let mut table = super::table(["Key", "Value", ""]);
    for variable in variables {
        let marker = if variable.key == template.identity_variable {
            "identity"
        } else if template.is_default_variable(&variable.key) {
            "default"
        } else {
            "custom"
        };
        table.add_row(vec![variable.key.as_str(), variable.value.as_str(), marker]);
    }
    table
}
