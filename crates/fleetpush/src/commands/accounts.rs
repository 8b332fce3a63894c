use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Table;
use fleetpush_core::{
    add_account, parse_target_list, remove_account, Account, AccountSelector, AddOutcome,
};
use tracing::info;

use crate::state::{require_template, AppState};

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// Show stored accounts and their targets
    List,
    /// Add an account, replacing any stored account with the same id
    Add(AddArgs),
    /// Remove an account by list position or alias
    Remove {
        /// Zero-based position or alias
        selector: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long, default_value = "")]
    pub alias: String,
    #[arg(long)]
    pub account_id: String,
    #[arg(long, env = "FLEETPUSH_API_TOKEN", hide_env_values = true)]
    pub api_token: String,
    /// Targets for one template as `TEMPLATE=name1,name2`. Repeatable.
    #[arg(long = "targets", value_name = "TEMPLATE=LIST")]
    pub targets: Vec<String>,
}

pub async fn handle_accounts_command(command: AccountsCommand, state: &AppState) -> Result<()> {
    match command {
        AccountsCommand::List => {
            let accounts = state.accounts().await?;
            if accounts.is_empty() {
                println!("No accounts stored.");
            } else {
                println!("{}", render_accounts(&accounts));
            }
        }
        AccountsCommand::Add(args) => {
            let account = build_account(args)?;
            let mut accounts = state.accounts().await?;
            let alias = account.alias.clone();
            let outcome = add_account(&mut accounts, account);
            state.save_accounts(&accounts).await?;
            info!(alias = %alias, ?outcome, "Account stored");
            match outcome {
                AddOutcome::Appended => println!("Added account '{alias}'."),
                AddOutcome::Replaced => println!("Replaced account '{alias}'."),
            }
        }
        AccountsCommand::Remove { selector } => {
            let mut accounts = state.accounts().await?;
            let removed = remove_account(&mut accounts, &AccountSelector::parse(&selector))
                .ok_or_else(|| anyhow!("no account matches '{selector}'"))?;
            state.save_accounts(&accounts).await?;
            info!(alias = %removed.alias, "Account removed");
            println!("Removed account '{}'.", removed.alias);
        }
    }
    Ok(())
}

pub fn build_account(args: AddArgs) -> Result<Account> {
    let mut account = Account::new(args.alias, args.account_id, args.api_token)?;
    for entry in &args.targets {
        let (template_id, list) = entry
            .split_once('=')
            .with_context(|| format!("expected TEMPLATE=LIST, got '{entry}'"))?;
        let template = require_template(template_id.trim())?;
        let targets = parse_target_list(list);
        if targets.is_empty() {
            bail!("no target names given for template '{}'", template.id);
        }
        account.set_targets(template.id, targets);
    }
    Ok(account)
}

pub fn render_accounts(accounts: &[Account]) -> Table {
    let mut table = super::table(["#", "Alias", "Account ID", "Targets"]);
    for (index, account) in accounts.iter().enumerate() {
        let targets = account
            .targets_by_template
            .iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(template, targets)| format!("{template}: {}", targets.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            index.to_string(),
            account.alias.clone(),
            account.account_id.clone(),
            targets,
        ]);
    }
    table
}
