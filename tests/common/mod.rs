// Common test utilities and helper structs
// Shared across test files to avoid duplication

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use serde::Serialize;
use tempfile::TempDir;
use tower::util::ServiceExt;

use lge_backend_core::{
    app::AppState,
    app_config::{AppConfig, EmailConfig},
    build_router,
    services::{CreditLedger, EmailService, JwtConfig, JwtService, PasswordResetService},
    store::JsonStore,
};

/// Email config pointing at a dead local port so sends fail fast instead
/// of reaching the network
pub fn test_email_config() -> EmailConfig {
    EmailConfig {
        resend_api_key: "test_key".to_string(),
        resend_api_url: "http://127.0.0.1:1/emails".to_string(),
        from_email: "noreply@test.local".to_string(),
        from_name: "LGE Test".to_string(),
        support_email: "support@test.local".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
    }
}

/// Test application wrapper. Keeps the temp data directory alive for the
/// duration of the test and exposes the ledger for direct assertions.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub data_dir: TempDir,
}

impl TestApp {
    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "POST", uri)
    }

    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "GET", uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "DELETE", uri)
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.state.ledger
    }

    /// Register an account and log it in, returning the bearer token
    pub async fn register_and_login(&self, username: &str, email: &str, password: &str) -> String {
        let response = self
            .post("/v1/auth/register")
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
                "password_confirmation": password,
                "accept_terms": true
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .post("/v1/auth/login")
            .json(&serde_json::json!({
                "identifier": username,
                "password": password
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = response.json().await;
        body["data"]["access_token"]
            .as_str()
            .expect("login returns access token")
            .to_string()
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: String,
    uri: String,
    body: Option<Vec<u8>>,
    bearer: Option<String>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            method: method.to_string(),
            uri: uri.to_string(),
            body: None,
            bearer: None,
        }
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method.as_str()).uri(&self.uri);
        if self.body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = &self.bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    pub async fn text(self) -> String {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }
}

/// Build an isolated ledger over a temp directory
pub async fn setup_ledger() -> (Arc<CreditLedger>, JsonStore, TempDir) {
    let data_dir = TempDir::new().expect("temp dir");
    let store = JsonStore::at(data_dir.path());
    let ledger = Arc::new(CreditLedger::open(store.clone()).await);
    (ledger, store, data_dir)
}

/// Setup a full test application over an isolated data directory
pub async fn setup_test_app() -> TestApp {
    let data_dir = TempDir::new().expect("temp dir");
    let store = JsonStore::at(data_dir.path());

    let ledger = Arc::new(CreditLedger::open(store.clone()).await);
    let jwt_service = Arc::new(JwtService::new(JwtConfig::for_test()));
    let password_reset_service = Arc::new(
        PasswordResetService::open(ledger.clone(), store)
            .await
            .with_timing_delay(1),
    );
    let email_service =
        Arc::new(EmailService::new(test_email_config()).expect("email service"));

    let mut config = AppConfig::from_env();
    config.email = test_email_config();
    config.storage.data_dir = Some(data_dir.path().to_path_buf());
    config.storage.io_timeout_secs = 5;

    let state = AppState {
        config: Arc::new(config),
        ledger,
        jwt_service,
        password_reset_service,
        email_service,
    };

    TestApp {
        app: build_router(state.clone()),
        state,
        data_dir,
    }
}
