use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{DeployError, DeployStep, StepFailure};
use crate::merge::merge_bindings;
use crate::ports::{BindingsFetch, ControlPlane, ScriptMetadata, TargetRef, UploadOutcome};
use crate::types::{Account, Binding, DeployLogEntry, Variable};

const MIN_ACCOUNT_ID_LEN: usize = 20;

/// Deploys one script to one (account, target) pair.
pub struct DeploymentExecutor {
    control_plane: Arc<dyn ControlPlane>,
    main_module: String,
    compatibility_date: String,
}

impl DeploymentExecutor {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: &EngineConfig) -> Self {
        Self {
            control_plane,
            main_module: config.main_module.clone(),
            compatibility_date: config.compatibility_date.clone(),
        }
    }

    /// Runs the pair pipeline and converts its outcome into a log entry.
    /// Never fails: every error becomes a failed entry tagged with its step.
    pub async fn deploy(
        &self,
        account: &Account,
        target: &str,
        variables: &[Variable],
        script: &str,
    ) -> DeployLogEntry {
        let label = DeployLogEntry::pair_label(&account.alias, target);

        match self.run_steps(account, target, variables, script).await {
            Ok(()) => {
                info!(account = %account.alias, target, "Deployed script");
                DeployLogEntry::deployed(label)
            }
            Err(failure) => {
                warn!(
                    account = %account.alias,
                    target,
                    step = %failure.step,
                    kind = %failure.kind(),
                    error = %failure.error,
                    "Deployment failed"
                );
                DeployLogEntry::failed(label, failure.kind(), failure.to_string())
            }
        }
    }

    async fn run_steps(
        &self,
        account: &Account,
        target: &str,
        variables: &[Variable],
        script: &str,
    ) -> Result<(), StepFailure> {
        validate_account_id(&account.account_id).map_err(at(DeployStep::Prepare))?;

        let target_ref = TargetRef {
            account_id: &account.account_id,
            api_token: &account.api_token,
            script_name: target,
        };

        let existing = self
            .control_plane
            .fetch_bindings(target_ref)
            .await
            .map_err(DeployError::from)
            .and_then(classify_bindings)
            .map_err(at(DeployStep::ReadConfiguration))?;

        let metadata = ScriptMetadata {
            main_module: self.main_module.clone(),
            bindings: merge_bindings(existing, variables),
            compatibility_date: self.compatibility_date.clone(),
        };

        let outcome = self
            .control_plane
            .upload_script(target_ref, &metadata, script)
            .await
            .map_err(DeployError::from)
            .map_err(at(DeployStep::Upload))?;

        match outcome {
            UploadOutcome::Accepted => Ok(()),
            UploadOutcome::Rejected { status, errors } => Err(StepFailure {
                step: DeployStep::Upload,
                error: DeployError::RemoteRejected {
                    status,
                    message: errors.into_iter().next(),
                },
            }),
        }
    }
}

fn at(step: DeployStep) -> impl FnOnce(DeployError) -> StepFailure {
    move |error| StepFailure { step, error }
}

fn classify_bindings(fetch: BindingsFetch) -> Result<Vec<Binding>, DeployError> {
    match fetch {
        BindingsFetch::Found(bindings) => Ok(bindings),
        BindingsFetch::NotFound => Ok(Vec::new()),
        BindingsFetch::Status(status) if is_credential_status(status) => {
            Err(DeployError::InvalidCredential { status })
        }
        BindingsFetch::Status(status) => Err(DeployError::RemoteRejected {
            status,
            message: None,
        }),
    }
}

fn is_credential_status(status: u16) -> bool {
    matches!(status, 400 | 401 | 403)
}

/// Account ids are at least 20 characters and never an email address.
pub fn validate_account_id(account_id: &str) -> Result<(), DeployError> {
    if account_id.contains('@') || account_id.chars().count() < MIN_ACCOUNT_ID_LEN {
        return Err(DeployError::InvalidIdentity(account_id.to_string()));
    }
    Ok(())
}
