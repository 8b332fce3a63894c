use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::executor::DeploymentExecutor;
use crate::fetcher::ScriptFetcher;
use crate::ports::{AccountRepository, ControlPlane, ScriptSource};
use crate::templates;
use crate::types::{Account, DeployLogEntry, EntryKind, Variable};

const ERROR_LABEL: &str = "error";
const NOTICE_LABEL: &str = "notice";
const NETWORK_ERROR_LABEL: &str = "network error";
pub const SYSTEM_ERROR_LABEL: &str = "system error";

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub template: String,
    pub entries: Vec<DeployLogEntry>,
    /// Set when the batch stopped early. Pairs that never finished have no entry.
    pub cancelled: bool,
}

impl BatchReport {
    fn single(template: &str, entry: DeployLogEntry) -> Self {
        Self {
            template: template.to_string(),
            entries: vec![entry],
            cancelled: false,
        }
    }

    fn cancelled(template: &str, entries: Vec<DeployLogEntry>) -> Self {
        Self {
            template: template.to_string(),
            entries,
            cancelled: true,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|entry| entry.success).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Fans one template's script out to every configured (account, target) pair.
pub struct BatchOrchestrator {
    accounts: Arc<dyn AccountRepository>,
    fetcher: ScriptFetcher,
    executor: Arc<DeploymentExecutor>,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        source: Arc<dyn ScriptSource>,
        control_plane: Arc<dyn ControlPlane>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            accounts,
            fetcher: ScriptFetcher::new(source),
            executor: Arc::new(DeploymentExecutor::new(control_plane, config)),
            concurrency: config.effective_concurrency(),
        }
    }

    pub async fn run_batch(&self, template_id: &str, variables: Vec<Variable>) -> BatchReport {
        self.run_batch_with_cancel(template_id, variables, CancellationToken::new())
            .await
    }

    /// Runs one batch. Always yields a well-formed report; entry order follows
    /// account order, then target order, whatever order the pairs finish in.
    /// A panic anywhere in the batch becomes a single system error entry.
    pub async fn run_batch_with_cancel(
        &self,
        template_id: &str,
        variables: Vec<Variable>,
        cancel: CancellationToken,
    ) -> BatchReport {
        match AssertUnwindSafe(self.run_guarded(template_id, variables, cancel))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(template = template_id, error = %message, "Batch panicked");
                BatchReport::single(
                    template_id,
                    DeployLogEntry::failed(SYSTEM_ERROR_LABEL, EntryKind::Unclassified, message),
                )
            }
        }
    }

    async fn run_guarded(
        &self,
        template_id: &str,
        variables: Vec<Variable>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let Some(template) = templates::resolve(template_id) else {
            warn!(template = template_id, "Unknown template requested");
            return BatchReport::single(
                template_id,
                DeployLogEntry::failed(
                    ERROR_LABEL,
                    EntryKind::UnknownTemplate,
                    format!("unknown template type '{template_id}'"),
                ),
            );
        };

        let accounts = match self.accounts.load_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(template = template.id, error = %err, "Failed to load accounts");
                return BatchReport::single(
                    template.id,
                    DeployLogEntry::failed(SYSTEM_ERROR_LABEL, EntryKind::Unclassified, err.to_string()),
                );
            }
        };

        if accounts.is_empty() {
            info!(template = template.id, "No accounts configured");
            return BatchReport::single(
                template.id,
                DeployLogEntry::notice(NOTICE_LABEL, EntryKind::NoAccounts, "add an account first"),
            );
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(template = template.id, "Batch cancelled before fetching source");
                return BatchReport::cancelled(template.id, Vec::new());
            }
            fetched = self.fetcher.fetch(template) => fetched,
        };
        let script = match fetched {
            Ok(script) => script,
            Err(err) => {
                error!(template = template.id, error = %err, "Script source unavailable");
                return BatchReport::single(
                    template.id,
                    DeployLogEntry::failed(
                        NETWORK_ERROR_LABEL,
                        EntryKind::SourceUnavailable,
                        format!("unable to fetch script source: {err}"),
                    ),
                );
            }
        };

        let pairs = collect_pairs(accounts, template.id);
        if pairs.is_empty() {
            info!(template = template.id, "No targets configured");
            return BatchReport::single(
                template.id,
                DeployLogEntry::notice(
                    NOTICE_LABEL,
                    EntryKind::NoTargets,
                    format!("no targets configured for template '{}'", template.id),
                ),
            );
        }

        info!(
            template = template.id,
            pairs = pairs.len(),
            concurrency = self.concurrency,
            "Starting batch"
        );

        let variables: Arc<[Variable]> = Arc::from(variables);
        let results: Vec<Option<DeployLogEntry>> = stream::iter(pairs)
            .map(|(account, target)| {
                let label = DeployLogEntry::pair_label(&account.alias, &target);
                let task = self.spawn_pair(
                    account,
                    target,
                    Arc::clone(&variables),
                    Arc::clone(&script.body),
                    cancel.clone(),
                );
                async move { task.join(label).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let entries: Vec<DeployLogEntry> = results.into_iter().flatten().collect();
        if cancel.is_cancelled() {
            warn!(template = template.id, completed = entries.len(), "Batch cancelled");
            return BatchReport::cancelled(template.id, entries);
        }

        let report = BatchReport {
            template: template.id.to_string(),
            entries,
            cancelled: false,
        };
        info!(
            template = template.id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }

    fn spawn_pair(
        &self,
        account: Arc<Account>,
        target: String,
        variables: Arc<[Variable]>,
        script: Arc<str>,
        cancel: CancellationToken,
    ) -> PairTask {
        let executor = Arc::clone(&self.executor);
        PairTask(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                entry = executor.deploy(&account, &target, &variables, &script) => Some(entry),
            }
        }))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "batch panicked".to_string()
    }
}

/// Pairs in enumeration order: accounts outer, targets inner, duplicates kept.
fn collect_pairs(accounts: Vec<Account>, template_id: &str) -> Vec<(Arc<Account>, String)> {
    let mut pairs = Vec::new();
    for account in accounts {
        let targets = account.targets_for(template_id).to_vec();
        if targets.is_empty() {
            continue;
        }
        let account = Arc::new(account);
        pairs.extend(targets.into_iter().map(|target| (Arc::clone(&account), target)));
    }
    pairs
}

/// Spawned pair deployment, aborted if the batch future is dropped.
struct PairTask(JoinHandle<Option<DeployLogEntry>>);

impl PairTask {
    async fn join(mut self, label: String) -> Option<DeployLogEntry> {
        match (&mut self.0).await {
            Ok(entry) => entry,
            Err(err) if err.is_cancelled() => None,
            Err(err) => {
                error!(label = %label, error = %err, "Deployment task panicked");
                Some(DeployLogEntry::failed(
                    label,
                    EntryKind::Unclassified,
                    format!("{SYSTEM_ERROR_LABEL}: {err}"),
                ))
            }
        }
    }
}

impl Drop for PairTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
