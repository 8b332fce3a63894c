//! JSON API over the account store, variable store and batch engine.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetpush_core::batch::SYSTEM_ERROR_LABEL;
use fleetpush_core::{settings, Account, DeployLogEntry, EntryKind, Variable};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::{require_template, AppState};

const DEFAULT_TEMPLATE: &str = "cmliu";

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    #[serde(rename = "type", default = "default_template")]
    pub template: String,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// A missing or `null` variable list deploys with no declared variables.
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub variables: Option<Vec<Variable>>,
}

pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                let message = format!("{err:#}");
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/accounts", get(list_accounts).post(replace_accounts))
        .route("/api/settings", get(read_settings).post(write_settings))
        .route("/api/deploy", post(deploy))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, bind: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn list_accounts(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Account>> {
    Ok(Json(state.accounts().await?))
}

async fn replace_accounts(
    State(state): State<Arc<AppState>>,
    Json(accounts): Json<Vec<Account>>,
) -> ApiResult<Value> {
    state.save_accounts(&accounts).await?;
    info!(accounts = accounts.len(), "Accounts replaced");
    Ok(Json(json!({ "success": true })))
}

async fn read_settings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Vec<Variable>> {
    let template = require_template(&query.template).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(Json(state.settings(template).await?))
}

async fn write_settings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateQuery>,
    Json(variables): Json<Vec<Variable>>,
) -> ApiResult<Value> {
    let template = require_template(&query.template).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let variables = settings::normalize_submission(variables);
    state.save_settings(template, &variables).await?;
    Ok(Json(json!({ "success": true })))
}

/// Unknown templates, store failures and unreadable bodies come back as
/// entries, never as HTTP errors.
async fn deploy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateQuery>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> Json<Vec<DeployLogEntry>> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let message = rejection.body_text();
            warn!(template = %query.template, error = %message, "Unreadable deploy request");
            return Json(vec![DeployLogEntry::failed(
                SYSTEM_ERROR_LABEL,
                EntryKind::Unclassified,
                message,
            )]);
        }
    };

    let report = state
        .deploy(
            &query.template,
            request.variables.unwrap_or_default(),
            CancellationToken::new(),
        )
        .await;
    Json(report.entries)
}
