use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use fleetpush_core::EngineConfig;
use serde::Deserialize;
use thiserror::Error;

pub const DATA_DIR_ENV: &str = "FLEETPUSH_DATA_DIR";
pub const BIND_ENV: &str = "FLEETPUSH_BIND";
pub const API_BASE_ENV: &str = "FLEETPUSH_API_BASE";
pub const CONCURRENCY_ENV: &str = "FLEETPUSH_CONCURRENCY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Settings for the `fleetpush` binary.
///
/// ```toml
/// data_dir = "/var/lib/fleetpush"
/// bind = "127.0.0.1:8787"
///
/// [engine]
/// concurrency = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("fleetpush-data"),
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the optional TOML file, then applies `FLEETPUSH_*` overrides from
    /// the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup`. Blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(dir) = get(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(bind) = get(BIND_ENV) {
            self.bind = bind.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: BIND_ENV,
                value: bind,
            })?;
        }
        if let Some(base) = get(API_BASE_ENV) {
            self.engine.api_base = base.trim().to_string();
        }
        if let Some(concurrency) = get(CONCURRENCY_ENV) {
            self.engine.concurrency =
                concurrency
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: CONCURRENCY_ENV,
                        value: concurrency,
                    })?;
        }
        Ok(self)
    }
}
