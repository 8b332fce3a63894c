use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::ports::ScriptSource;
use crate::templates::TemplateConfig;

/// Fetches raw script text over HTTP.
#[derive(Debug, Clone)]
pub struct HttpScriptSource {
    http: reqwest::Client,
}

impl HttpScriptSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ScriptSource for HttpScriptSource {
    async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        debug!(url, "Fetching script source");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Script text ready for upload, shared read-only across every pair of a batch.
#[derive(Debug, Clone)]
pub struct FetchedScript {
    pub body: Arc<str>,
    pub digest: String,
}

pub struct ScriptFetcher {
    source: Arc<dyn ScriptSource>,
}

impl ScriptFetcher {
    pub fn new(source: Arc<dyn ScriptSource>) -> Self {
        Self { source }
    }

    /// Fetches the template's source once and applies its patch.
    pub async fn fetch(&self, template: &TemplateConfig) -> Result<FetchedScript, SourceError> {
        let raw = self.source.fetch(template.source_url).await?;
        let body = template.apply_patch(&raw);
        let digest = blake3::hash(body.as_bytes()).to_hex().to_string();
        info!(
            template = template.id,
            bytes = body.len(),
            digest = %digest,
            "Fetched script source"
        );
        Ok(FetchedScript {
            body: Arc::from(body),
            digest,
        })
    }
}
