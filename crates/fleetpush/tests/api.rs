use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fleetpush::{api, AppState};
use fleetpush_core::ports::{
    BindingsFetch, ControlPlane, ScriptMetadata, ScriptSource, TargetRef, UploadOutcome,
};
use fleetpush_core::{ControlPlaneError, EngineConfig, SourceError};
use fleetpush_store::MemoryKvStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const ACCOUNT_ID: &str = "0123456789abcdef0123456789abcdef";

struct StaticSource;

#[async_trait]
impl ScriptSource for StaticSource {
    async fn fetch(&self, _url: &str) -> Result<String, SourceError> {
        Ok("export default {};".to_string())
    }
}

#[derive(Default)]
struct RecordingControlPlane {
    uploads: Mutex<Vec<(String, ScriptMetadata)>>,
}

#[async_trait]
impl ControlPlane for RecordingControlPlane {
    async fn fetch_bindings(
        &self,
        _target: TargetRef<'_>,
    ) -> Result<BindingsFetch, ControlPlaneError> {
        Ok(BindingsFetch::NotFound)
    }

    async fn upload_script(
        &self,
        target: TargetRef<'_>,
        metadata: &ScriptMetadata,
        _script: &str,
    ) -> Result<UploadOutcome, ControlPlaneError> {
        self.uploads
            .lock()
            .unwrap()
            .push((target.script_name.to_string(), metadata.clone()));
        Ok(UploadOutcome::Accepted)
    }
}

fn app() -> (axum::Router, Arc<RecordingControlPlane>) {
    let control_plane = Arc::new(RecordingControlPlane::default());
    let state = AppState::with_adapters(
        Arc::new(MemoryKvStore::new()),
        Arc::new(StaticSource),
        control_plane.clone(),
        &EngineConfig::default(),
    );
    (api::router(Arc::new(state)), control_plane)
}

async fn call(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn accounts_round_trip_in_stored_layout() {
    let (router, _) = app();

    let (status, body) = call(&router, "GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let accounts = json!([{
        "alias": "main",
        "accountId": ACCOUNT_ID,
        "apiToken": "token",
        "workers_cmliu": ["edge-1", "edge-2"],
    }]);
    let (status, body) = call(&router, "POST", "/api/accounts", Some(accounts.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, body) = call(&router, "GET", "/api/accounts", None).await;
    assert_eq!(body, accounts);
}

#[tokio::test]
async fn settings_default_to_reconciled_template_variables() {
    let (router, _) = app();

    let (status, body) = call(&router, "GET", "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, ["UUID", "PROXYIP", "PATH", "URL", "KEY", "ADMIN"]);
    assert!(!body[0]["value"].as_str().unwrap().is_empty());

    let saved = json!([{"key": "u", "value": "fixed"}, {"key": "  ", "value": "dropped"}, {"key": "X", "value": " 1 "}]);
    let (status, _) = call(&router, "POST", "/api/settings?type=joey", Some(saved)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&router, "GET", "/api/settings?type=joey", None).await;
    assert_eq!(body, json!([{"key": "u", "value": "fixed"}, {"key": "X", "value": "1"}]));
}

#[tokio::test]
async fn settings_for_unknown_template_are_bad_requests() {
    let (router, _) = app();

    let (status, body) = call(&router, "GET", "/api/settings?type=nope", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn deploy_returns_entries_for_each_target() {
    let (router, control_plane) = app();
    let accounts = json!([{
        "alias": "main",
        "accountId": ACCOUNT_ID,
        "apiToken": "token",
        "workers_cmliu": ["edge-1", "edge-2"],
    }]);
    call(&router, "POST", "/api/accounts", Some(accounts)).await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/deploy?type=cmliu",
        Some(json!({"variables": [{"key": "UUID", "value": "abc"}, {"key": "PATH", "value": ""}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"label": "main -> [edge-1]", "success": true, "message": "updated", "kind": "deployed"},
            {"label": "main -> [edge-2]", "success": true, "message": "updated", "kind": "deployed"},
        ])
    );

    let uploads = control_plane.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    let bindings = serde_json::to_value(&uploads[0].1.bindings).unwrap();
    assert_eq!(bindings, json!([{"name": "UUID", "type": "plain_text", "text": "abc"}]));
}

#[tokio::test]
async fn deploy_reports_unknown_template_as_entry() {
    let (router, control_plane) = app();

    let (status, body) = call(&router, "POST", "/api/deploy?type=nope", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["kind"], json!("unknown_template"));
    assert_eq!(body[0]["success"], json!(false));
    assert!(control_plane.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deploy_without_accounts_is_a_notice() {
    let (router, _) = app();

    let (_, body) = call(&router, "POST", "/api/deploy", Some(json!({"variables": []}))).await;

    assert_eq!(body[0]["kind"], json!("no_accounts"));
    assert_eq!(body[0]["success"], json!(true));
}

#[tokio::test]
async fn deploy_treats_null_variables_as_none_declared() {
    let (router, control_plane) = app();
    let accounts = json!([{
        "alias": "main",
        "accountId": ACCOUNT_ID,
        "apiToken": "token",
        "workers_cmliu": ["edge-1"],
    }]);
    call(&router, "POST", "/api/accounts", Some(accounts)).await;

    let (status, body) = call(&router, "POST", "/api/deploy", Some(json!({"variables": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["kind"], json!("deployed"));

    let (status, body) = call(
        &router,
        "POST",
        "/api/deploy",
        Some(json!({"variables": [{"key": "A", "value": null}, {"key": "B", "value": "b"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["kind"], json!("deployed"));

    let uploads = control_plane.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].1.bindings.is_empty());
    let bindings = serde_json::to_value(&uploads[1].1.bindings).unwrap();
    assert_eq!(bindings, json!([{"name": "B", "type": "plain_text", "text": "b"}]));
}

#[tokio::test]
async fn unreadable_deploy_body_is_a_system_error_entry() {
    let (router, control_plane) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/deploy?type=cmliu")
        .header("content-type", "application/json")
        .body(Body::from("{oops"))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["label"], json!("system error"));
    assert_eq!(entries[0]["kind"], json!("unclassified"));
    assert_eq!(entries[0]["success"], json!(false));
    assert!(control_plane.uploads.lock().unwrap().is_empty());
}
