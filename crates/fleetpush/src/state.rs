use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fleetpush_core::ports::{AccountRepository, ControlPlane, ScriptSource, VariableRepository};
use fleetpush_core::{
    settings, Account, BatchOrchestrator, BatchReport, CloudflareControlPlane, EngineConfig,
    HttpScriptSource, TemplateConfig, Variable,
};
use fleetpush_store::{FsKvStore, KvAccountStore, KvStore, KvVariableStore};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Everything a command or request handler needs, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    accounts: Arc<dyn AccountRepository>,
    variables: Arc<dyn VariableRepository>,
    orchestrator: Arc<BatchOrchestrator>,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = FsKvStore::open(&config.data_dir)
            .await
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?;
        let source = HttpScriptSource::new(config.engine.request_timeout())
            .context("failed to build script source client")?;
        let control_plane = CloudflareControlPlane::new(&config.engine)
            .context("failed to build control plane client")?;

        Ok(Self::with_adapters(
            Arc::new(store),
            Arc::new(source),
            Arc::new(control_plane),
            &config.engine,
        ))
    }

    pub fn with_adapters(
        store: Arc<dyn KvStore>,
        source: Arc<dyn ScriptSource>,
        control_plane: Arc<dyn ControlPlane>,
        engine: &EngineConfig,
    ) -> Self {
        let accounts: Arc<dyn AccountRepository> = Arc::new(KvAccountStore::new(store.clone()));
        let orchestrator = BatchOrchestrator::new(accounts.clone(), source, control_plane, engine);
        Self {
            accounts,
            variables: Arc::new(KvVariableStore::new(store)),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.accounts
            .load_accounts()
            .await
            .context("failed to load accounts")
    }

    pub async fn save_accounts(&self, accounts: &[Account]) -> Result<()> {
        self.accounts
            .save_accounts(accounts)
            .await
            .context("failed to save accounts")
    }

    /// Stored variables for a template, reconciled against its defaults.
    pub async fn settings(&self, template: &TemplateConfig) -> Result<Vec<Variable>> {
        let saved = self
            .variables
            .load_variables(template.id)
            .await
            .with_context(|| format!("failed to load variables for '{}'", template.id))?;
        Ok(settings::reconcile_variables(template, saved))
    }

    pub async fn save_settings(&self, template: &TemplateConfig, variables: &[Variable]) -> Result<()> {
        self.variables
            .save_variables(template.id, variables)
            .await
            .with_context(|| format!("failed to save variables for '{}'", template.id))
    }

    pub async fn deploy(
        &self,
        template_id: &str,
        variables: Vec<Variable>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let variables = settings::normalize_submission(variables);
        self.orchestrator
            .run_batch_with_cancel(template_id, variables, cancel)
            .await
    }
}

pub fn require_template(template_id: &str) -> Result<&'static TemplateConfig> {
    fleetpush_core::resolve(template_id).ok_or_else(|| anyhow!("unknown template type '{template_id}'"))
}
