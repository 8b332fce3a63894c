//! reqwest-backed client for the Workers script API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ControlPlaneError;
use crate::ports::{BindingsFetch, ControlPlane, ScriptMetadata, TargetRef, UploadOutcome};
use crate::types::Binding;

const SCRIPT_CONTENT_TYPE: &str = "application/javascript+module";

#[derive(Debug, Clone)]
pub struct CloudflareControlPlane {
    http: reqwest::Client,
    api_base: Url,
}

/// Response envelope shared by every API method.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: Option<String>,
}

impl CloudflareControlPlane {
    pub fn new(config: &EngineConfig) -> Result<Self, ControlPlaneError> {
        let api_base = Url::parse(&config.api_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ControlPlaneError::InvalidBaseUrl(config.api_base.clone()))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, api_base })
    }

    /// Account id and script name are percent-encoded as single path segments.
    fn script_url(&self, target: TargetRef<'_>, suffix: Option<&str>) -> Result<Url, ControlPlaneError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ControlPlaneError::InvalidBaseUrl(self.api_base.to_string()))?;
            segments.pop_if_empty().extend([
                "accounts",
                target.account_id,
                "workers",
                "scripts",
                target.script_name,
            ]);
            segments.extend(suffix);
        }
        Ok(url)
    }
}

#[async_trait]
impl ControlPlane for CloudflareControlPlane {
    async fn fetch_bindings(
        &self,
        target: TargetRef<'_>,
    ) -> Result<BindingsFetch, ControlPlaneError> {
        let url = self.script_url(target, Some("bindings"))?;
        debug!(?target, "Reading bindings");

        let response = self
            .http
            .get(url)
            .bearer_auth(target.api_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(BindingsFetch::NotFound);
        }
        if !status.is_success() {
            return Ok(BindingsFetch::Status(status.as_u16()));
        }

        let envelope: ApiEnvelope<Vec<Binding>> = response.json().await?;
        Ok(BindingsFetch::Found(envelope.result.unwrap_or_default()))
    }

    async fn upload_script(
        &self,
        target: TargetRef<'_>,
        metadata: &ScriptMetadata,
        script: &str,
    ) -> Result<UploadOutcome, ControlPlaneError> {
        let script_part = Part::text(script.to_string())
            .file_name(metadata.main_module.clone())
            .mime_str(SCRIPT_CONTENT_TYPE)?;
        let form = Form::new()
            .text("metadata", serde_json::to_string(metadata)?)
            .part("script", script_part);

        debug!(?target, bindings = metadata.bindings.len(), "Uploading script");
        let response = self
            .http
            .put(self.script_url(target, None)?)
            .bearer_auth(target.api_token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(UploadOutcome::Accepted);
        }

        let body = response.text().await?;
        let errors = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
            .map(|envelope| {
                envelope
                    .errors
                    .into_iter()
                    .filter_map(|error| error.message)
                    .filter(|message| !message.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(UploadOutcome::Rejected {
            status: status.as_u16(),
            errors,
        })
    }
}
