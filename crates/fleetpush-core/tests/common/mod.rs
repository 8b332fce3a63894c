#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleetpush_core::ports::{
    AccountRepository, BindingsFetch, ControlPlane, ScriptMetadata, ScriptSource, TargetRef,
    UploadOutcome,
};
use fleetpush_core::{
    Account, BatchOrchestrator, ControlPlaneError, EngineConfig, RepositoryError, SourceError,
};

pub const ACCOUNT_ID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const ACCOUNT_ID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchBindings { account_id: String, target: String },
    Upload {
        account_id: String,
        target: String,
        metadata: ScriptMetadata,
        script: String,
    },
}

/// Scripted control plane. Unknown targets have no bindings and accept uploads.
#[derive(Default)]
pub struct FakeControlPlane {
    bindings: HashMap<String, BindingsFetch>,
    uploads: HashMap<String, UploadOutcome>,
    delays: HashMap<String, Duration>,
    hanging: Vec<String>,
    panicking: Vec<String>,
    calls: Mutex<Vec<Call>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(mut self, target: &str, fetch: BindingsFetch) -> Self {
        self.bindings.insert(target.to_string(), fetch);
        self
    }

    pub fn with_upload(mut self, target: &str, outcome: UploadOutcome) -> Self {
        self.uploads.insert(target.to_string(), outcome);
        self
    }

    pub fn with_delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    /// Reads for this target never complete.
    pub fn hanging(mut self, target: &str) -> Self {
        self.hanging.push(target.to_string());
        self
    }

    /// Reads for this target panic.
    pub fn panicking(mut self, target: &str) -> Self {
        self.panicking.push(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Upload { .. }))
            .collect()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn fetch_bindings(
        &self,
        target: TargetRef<'_>,
    ) -> Result<BindingsFetch, ControlPlaneError> {
        self.calls.lock().unwrap().push(Call::FetchBindings {
            account_id: target.account_id.to_string(),
            target: target.script_name.to_string(),
        });

        if self.panicking.iter().any(|name| name == target.script_name) {
            panic!("control plane exploded on {}", target.script_name);
        }
        if self.hanging.iter().any(|name| name == target.script_name) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(target.script_name) {
            tokio::time::sleep(*delay).await;
        }

        Ok(self
            .bindings
            .get(target.script_name)
            .cloned()
            .unwrap_or(BindingsFetch::NotFound))
    }

    async fn upload_script(
        &self,
        target: TargetRef<'_>,
        metadata: &ScriptMetadata,
        script: &str,
    ) -> Result<UploadOutcome, ControlPlaneError> {
        self.calls.lock().unwrap().push(Call::Upload {
            account_id: target.account_id.to_string(),
            target: target.script_name.to_string(),
            metadata: metadata.clone(),
            script: script.to_string(),
        });

        Ok(self
            .uploads
            .get(target.script_name)
            .cloned()
            .unwrap_or(UploadOutcome::Accepted))
    }
}

pub struct FakeSource {
    response: Result<String, u16>,
    panics: bool,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn serving(script: &str) -> Self {
        Self {
            response: Ok(script.to_string()),
            panics: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::serving("")
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            panics: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptSource for FakeSource {
    async fn fetch(&self, _url: &str) -> Result<String, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("script source exploded");
        }
        self.response.clone().map_err(SourceError::Status)
    }
}

pub struct StaticAccounts {
    accounts: Option<Vec<Account>>,
}

impl StaticAccounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Some(accounts),
        }
    }

    pub fn broken() -> Self {
        Self { accounts: None }
    }
}

#[async_trait]
impl AccountRepository for StaticAccounts {
    async fn load_accounts(&self) -> Result<Vec<Account>, RepositoryError> {
        self.accounts
            .clone()
            .ok_or_else(|| RepositoryError::Storage("disk unavailable".into()))
    }

    async fn save_accounts(&self, _accounts: &[Account]) -> Result<(), RepositoryError> {
        Ok(())
    }
}

pub fn account(alias: &str, account_id: &str, template: &str, targets: &[&str]) -> Account {
    Account::new(alias, account_id, "token")
        .expect("valid account")
        .with_targets(template, targets.iter().map(|t| t.to_string()).collect())
}

pub struct Harness {
    pub control_plane: Arc<FakeControlPlane>,
    pub source: Arc<FakeSource>,
    pub orchestrator: BatchOrchestrator,
}

pub fn harness(
    accounts: Vec<Account>,
    source: FakeSource,
    control_plane: FakeControlPlane,
    concurrency: usize,
) -> Harness {
    harness_with_repository(Arc::new(StaticAccounts::new(accounts)), source, control_plane, concurrency)
}

pub fn harness_with_repository(
    accounts: Arc<dyn AccountRepository>,
    source: FakeSource,
    control_plane: FakeControlPlane,
    concurrency: usize,
) -> Harness {
    let control_plane = Arc::new(control_plane);
    let source = Arc::new(source);
    let config = EngineConfig {
        concurrency,
        ..EngineConfig::default()
    };
    let orchestrator =
        BatchOrchestrator::new(accounts, source.clone(), control_plane.clone(), &config);
    Harness {
        control_plane,
        source,
        orchestrator,
    }
}
