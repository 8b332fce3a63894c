//! Key-value blob storage for account records and variable sets.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fleetpush_core::ports::{AccountRepository, VariableRepository};
use fleetpush_core::{Account, RepositoryError, Variable};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub const ACCOUNTS_KEY: &str = "ACCOUNTS_UNIFIED_STORAGE";

pub fn variables_key(template_id: &str) -> String {
    format!("VARS_{template_id}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FsKvStore {
    root: PathBuf,
}

impl FsKvStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KvStore for FsKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Write-then-rename so readers never observe a half-written record.
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, &value).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(key, bytes = value.len(), "Stored record");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Account list stored as one JSON array under [`ACCOUNTS_KEY`].
#[derive(Clone)]
pub struct KvAccountStore {
    store: Arc<dyn KvStore>,
}

impl KvAccountStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccountRepository for KvAccountStore {
    async fn load_accounts(&self) -> Result<Vec<Account>, RepositoryError> {
        match self.store.get(ACCOUNTS_KEY).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), RepositoryError> {
        let raw = serde_json::to_vec(accounts)?;
        self.store.put(ACCOUNTS_KEY, Bytes::from(raw)).await?;
        Ok(())
    }
}

/// Variable sets stored per template under `VARS_<template>`.
#[derive(Clone)]
pub struct KvVariableStore {
    store: Arc<dyn KvStore>,
}

impl KvVariableStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VariableRepository for KvVariableStore {
    async fn load_variables(
        &self,
        template_id: &str,
    ) -> Result<Option<Vec<Variable>>, RepositoryError> {
        let Some(raw) = self.store.get(&variables_key(template_id)).await? else {
            return Ok(None);
        };
        // A stored `null` is treated like a missing record.
        Ok(serde_json::from_slice::<Option<Vec<Variable>>>(&raw)?)
    }

    async fn save_variables(
        &self,
        template_id: &str,
        variables: &[Variable],
    ) -> Result<(), RepositoryError> {
        let raw = serde_json::to_vec(variables)?;
        self.store
            .put(&variables_key(template_id), Bytes::from(raw))
            .await?;
        Ok(())
    }
}
