use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Tunables shared by the executor, the HTTP adapters and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api_base: String,
    pub main_module: String,
    pub compatibility_date: String,
    /// Number of (account, target) pairs deployed at once. `1` is strictly sequential.
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            main_module: "index.js".to_string(),
            compatibility_date: "2024-01-01".to_string(),
            concurrency: 4,
            request_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}
