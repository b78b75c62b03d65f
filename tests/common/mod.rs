//! Shared fixtures for the integration suite: an in-memory application,
//! a capturing mailer and a programmable Google verifier.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{json, Value};
use trendscout::{
    app::build_app,
    auth::google::{GoogleAuthError, GoogleIdentity, IdTokenVerifier},
    config::{AppConfig, JwtConfig, MongoConfig, RateLimitConfig},
    email::Mailer,
    rate_limit::{MemoryCounterStore, RateLimiter},
    state::AppState,
    store::MemoryStore,
};

/// Captures reset emails instead of sending them.
#[derive(Default, Clone)]
pub struct MockMailer {
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reset URL mailed to `email`, if any.
    pub fn last_url_for(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, url)| url.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), String> {
        self.sent
            .write()
            .unwrap()
            .push((email.to_string(), reset_url.to_string()));
        Ok(())
    }
}

/// Stand-in for Google's certs endpoint: returns one fixed outcome.
pub struct StaticVerifier {
    outcome: Mutex<Result<GoogleIdentity, String>>,
}

impl StaticVerifier {
    pub fn accepting(sub: &str, email: &str, name: Option<&str>) -> Self {
        Self {
            outcome: Mutex::new(Ok(GoogleIdentity {
                sub: sub.to_string(),
                email: email.to_string(),
                name: name.map(str::to_string),
            })),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            outcome: Mutex::new(Err(reason.to_string())),
        }
    }
}

#[async_trait]
impl IdTokenVerifier for StaticVerifier {
    async fn verify(&self, _id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .map_err(GoogleAuthError::Invalid)
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: MemoryStore,
    pub mailer: MockMailer,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt: JwtConfig {
            secret: "integration-secret".into(),
            issuer: "trendscout".into(),
            audience: "trendscout-users".into(),
            access_ttl_minutes: 120,
            refresh_ttl_days: 7,
        },
        mongo: MongoConfig {
            uri: None,
            database: "trendscout-test".into(),
        },
        smtp: None,
        rate_limit: RateLimitConfig {
            enabled: false,
            auth_limit: 5,
            auth_window_secs: 3600,
            reset_limit: 3,
            reset_window_secs: 3600,
        },
        frontend_url: "http://localhost:3000".into(),
        google_client_id: None,
        email_whitelist: None,
    }
}

pub fn spawn_app(config: AppConfig, google: Option<Arc<dyn IdTokenVerifier>>) -> TestApp {
    let store = MemoryStore::new();
    let mailer = MockMailer::new();
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        config.rate_limit.enabled,
    ));
    let state = AppState::from_parts(
        Arc::new(config),
        Arc::new(store.clone()),
        Arc::new(mailer.clone()),
        google,
        limiter,
    );
    let server = TestServer::new(build_app(state)).expect("failed to build test server");
    TestApp {
        server,
        store,
        mailer,
    }
}

pub fn spawn_default() -> TestApp {
    spawn_app(test_config(), None)
}

/// Signs up a user and returns `(access_token, user_id)`.
pub async fn signup(server: &TestServer, email: &str, password: &str) -> (String, String) {
    let response = server
        .post("/api/auth/signup")
        .json(&json!({ "name": "Test User", "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), 201, "signup failed: {}", response.text());
    let body: Value = response.json();
    (
        body["access_token"].as_str().expect("access token").to_string(),
        body["user"]["id"].as_str().expect("user id").to_string(),
    )
}

pub fn bearer(token: &str) -> axum::http::HeaderValue {
    axum::http::HeaderValue::from_str(&format!("Bearer {token}")).expect("header value")
}
