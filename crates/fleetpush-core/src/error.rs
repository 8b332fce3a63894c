// crates/fleetpush-core/src/error.rs

use std::fmt;

use thiserror::Error;

use crate::types::EntryKind;

/// Failure talking to the remote control plane below the HTTP status level.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not encode upload metadata: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("api base '{0}' is not a usable URL")]
    InvalidBaseUrl(String),
}

/// Failure retrieving a template's script source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source responded with HTTP {0}")]
    Status(u16),
}

/// Failure reading or writing accounts and variable sets.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored record is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Per-pair deployment failure.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("account id '{0}' is malformed (expected at least 20 characters and no '@')")]
    InvalidIdentity(String),

    #[error("api token rejected (HTTP {status})")]
    InvalidCredential { status: u16 },

    #[error("{}", describe_rejection(.status, .message))]
    RemoteRejected { status: u16, message: Option<String> },

    #[error(transparent)]
    Transport(#[from] ControlPlaneError),
}

fn describe_rejection(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("API rejected: {message}"),
        None => format!("API rejected: HTTP {status}"),
    }
}

impl DeployError {
    pub fn kind(&self) -> EntryKind {
        match self {
            DeployError::InvalidIdentity(_) => EntryKind::InvalidIdentity,
            DeployError::InvalidCredential { .. } => EntryKind::InvalidCredential,
            DeployError::RemoteRejected { .. } => EntryKind::RemoteRejected,
            DeployError::Transport(_) => EntryKind::Unclassified,
        }
    }
}

/// Steps that can fail. Merging is infallible and never tags a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Prepare,
    ReadConfiguration,
    Upload,
}

impl DeployStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStep::Prepare => "prepare",
            DeployStep::ReadConfiguration => "read configuration",
            DeployStep::Upload => "upload",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`DeployError`] tagged with the step that was running when it occurred.
#[derive(Error, Debug)]
#[error("[{step}] {error}")]
pub struct StepFailure {
    pub step: DeployStep,
    #[source]
    pub error: DeployError,
}

impl StepFailure {
    pub fn kind(&self) -> EntryKind {
        self.error.kind()
    }
}
