use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetpush::api;
use fleetpush::commands::accounts::{handle_accounts_command, AccountsCommand};
use fleetpush::commands::deploy::{handle_deploy_command, DeployArgs};
use fleetpush::commands::templates::render_templates;
use fleetpush::commands::vars::{handle_vars_command, VarsArgs};
use fleetpush::{AppConfig, AppState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch worker deployment across accounts", long_about = None)]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true, env = "FLEETPUSH_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push a template's script to every configured target
    Deploy(DeployArgs),
    /// Manage stored accounts
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
    /// Manage a template's stored variables
    Vars(VarsArgs),
    /// List registered templates
    Templates,
    /// Start the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Templates => println!("{}", render_templates()),
        Command::Deploy(args) => {
            let state = AppState::from_config(&config).await?;
            let report = handle_deploy_command(args, &state, cancel_on_ctrl_c()).await?;
            if report.has_failures() || report.cancelled {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Accounts { command } => {
            let state = AppState::from_config(&config).await?;
            handle_accounts_command(command, &state).await?;
        }
        Command::Vars(args) => {
            let state = AppState::from_config(&config).await?;
            handle_vars_command(args, &state).await?;
        }
        Command::Serve => {
            let state = AppState::from_config(&config).await?;
            info!(bind = %config.bind, data_dir = %config.data_dir.display(), "Starting API server");
            api::serve(Arc::new(state), config.bind, cancel_on_ctrl_c()).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}
