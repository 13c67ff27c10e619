#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use labflow_api::auth::jwt::{generate_access_token, JwtConfig};
use labflow_api::config::ServerConfig;
use labflow_api::router::build_app_router;
use labflow_api::state::AppState;
use labflow_core::config::EngineConfig;
use labflow_core::directory::MemoryIdentityDirectory;
use labflow_core::signature::MemoryCredentialValidator;
use labflow_core::store::MemoryReportStore;
use labflow_core::workflow::{MemoryWorkflowRepository, WorkflowEngine};
use labflow_events::{AuditLogger, EventBus, EventBusAuditSink};

/// Password registered for `dr-path` in the test credential validator.
pub const PATHOLOGIST_PASSWORD: &str = "s3cret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        engine: EngineConfig::default(),
    }
}

/// Build the full application router with in-memory collaborators and a
/// running audit logger. Must be called inside a Tokio runtime.
pub fn build_test_app() -> Router {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> Router {
    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(AuditLogger::run(event_bus.subscribe()));

    let reports = Arc::new(MemoryReportStore::new());
    let directory = Arc::new(MemoryIdentityDirectory::new());
    let engine = WorkflowEngine::new(
        reports.clone(),
        Arc::new(MemoryWorkflowRepository::new()),
        Arc::new(MemoryCredentialValidator::new().with_password("dr-path", PATHOLOGIST_PASSWORD)),
        directory.clone(),
        Arc::new(EventBusAuditSink::new(Arc::clone(&event_bus))),
        config.engine.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
        reports,
        directory,
        event_bus,
    };

    build_app_router(state, &config)
}

/// Bearer token for a practitioner, signed with the test secret.
pub fn token(user_id: &str, name: &str, roles: &[&str]) -> String {
    generate_access_token(user_id, name, roles, &test_config().jwt)
        .expect("token generation should succeed")
}

pub fn manager_token() -> String {
    token("mgr", "Lab Manager", &["lab-manager"])
}

pub fn pathologist_token() -> String {
    token("dr-path", "Dr Path", &["pathologist"])
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Unauthenticated GET.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
