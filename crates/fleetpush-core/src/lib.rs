//! Batch deployment engine: fetch a template's script once, merge declared
//! variables into each target's bindings and upload per target.

pub mod accounts;
pub mod batch;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod merge;
pub mod ports;
pub mod settings;
pub mod templates;
pub mod types;

pub use accounts::{add_account, remove_account, AccountSelector, AddOutcome};
pub use batch::{BatchOrchestrator, BatchReport};
pub use config::EngineConfig;
pub use control_plane::CloudflareControlPlane;
pub use error::{ControlPlaneError, DeployError, DeployStep, RepositoryError, SourceError, StepFailure};
pub use fetcher::HttpScriptSource;
pub use templates::{all_templates, resolve, TemplateConfig};
pub use types::{parse_target_list, Account, AccountError, Binding, DeployLogEntry, EntryKind, Variable};
