//! Boundaries between the deployment engine and the outside world.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{ControlPlaneError, RepositoryError, SourceError};
use crate::types::{Account, Binding, Variable};

/// Identifies one remote worker and the credentials used to reach it.
#[derive(Clone, Copy)]
pub struct TargetRef<'a> {
    pub account_id: &'a str,
    pub api_token: &'a str,
    pub script_name: &'a str,
}

impl std::fmt::Debug for TargetRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRef")
            .field("account_id", &self.account_id)
            .field("script_name", &self.script_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingsFetch {
    Found(Vec<Binding>),
    NotFound,
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted,
    Rejected { status: u16, errors: Vec<String> },
}

/// Structured half of the multipart upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptMetadata {
    pub main_module: String,
    pub bindings: Vec<Binding>,
    pub compatibility_date: String,
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn fetch_bindings(&self, target: TargetRef<'_>)
        -> Result<BindingsFetch, ControlPlaneError>;

    async fn upload_script(
        &self,
        target: TargetRef<'_>,
        metadata: &ScriptMetadata,
        script: &str,
    ) -> Result<UploadOutcome, ControlPlaneError>;
}

#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SourceError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Returns the stored accounts in order, or an empty list when none exist.
    async fn load_accounts(&self) -> Result<Vec<Account>, RepositoryError>;
    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VariableRepository: Send + Sync {
    async fn load_variables(
        &self,
        template_id: &str,
    ) -> Result<Option<Vec<Variable>>, RepositoryError>;
    async fn save_variables(
        &self,
        template_id: &str,
        variables: &[Variable],
    ) -> Result<(), RepositoryError>;
}
