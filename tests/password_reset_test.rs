//! Forgot/reset password flow, including the anti-enumeration reply and
//! single-use token semantics.

mod common;

use common::{signup, spawn_default};
use serde_json::{json, Value};

const GENERIC_REPLY: &str = "If an account exists, an email was sent";

fn token_from(url: &str) -> String {
    url.split_once("token=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or("").to_string())
        .expect("reset url carries a token")
}

#[tokio::test]
async fn forgot_replies_generically_for_unknown_emails() {
    let app = spawn_default();

    let response = app
        .server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "nobody@example.com" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["detail"], Value::Null);
    assert_eq!(body["message"], GENERIC_REPLY);
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn reset_flow_changes_the_password() {
    let app = spawn_default();
    signup(&app.server, "reset@example.com", "0ld!Passw0rd").await;

    let response = app
        .server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "reset@example.com" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let url = app
        .mailer
        .last_url_for("reset@example.com")
        .expect("reset email captured");
    assert!(url.starts_with("http://localhost:3000/reset-password?token="));
    assert!(url.ends_with("&email=reset@example.com"));
    let token = token_from(&url);

    let response = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": token, "new_password": "N3w!Passw0rd" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "Password updated");

    let old = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "reset@example.com", "password": "0ld!Passw0rd" }))
        .await;
    assert_eq!(old.status_code(), 401);

    let new = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "reset@example.com", "password": "N3w!Passw0rd" }))
        .await;
    assert_eq!(new.status_code(), 200);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = spawn_default();
    signup(&app.server, "once@example.com", "0ld!Passw0rd").await;

    app.server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "once@example.com" }))
        .await;
    let token = token_from(&app.mailer.last_url_for("once@example.com").unwrap());

    let first = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": token, "new_password": "N3w!Passw0rd" }))
        .await;
    assert_eq!(first.status_code(), 200);

    let second = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": token, "new_password": "0ther!Pass1" }))
        .await;
    assert_eq!(second.status_code(), 400);
    let body: Value = second.json();
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn reset_accepts_passwords_the_signup_policy_would_reject() {
    let app = spawn_default();
    signup(&app.server, "lax@example.com", "0ld!Passw0rd").await;

    app.server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "lax@example.com" }))
        .await;
    let token = token_from(&app.mailer.last_url_for("lax@example.com").unwrap());

    let response = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": token, "new_password": "weak" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "lax@example.com", "password": "weak" }))
        .await;
    assert_eq!(login.status_code(), 200);
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = spawn_default();
    signup(&app.server, "late@example.com", "0ld!Passw0rd").await;

    app.server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "late@example.com" }))
        .await;
    let token = token_from(&app.mailer.last_url_for("late@example.com").unwrap());
    app.store.expire_reset_token("late@example.com");

    let response = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": token, "new_password": "N3w!Passw0rd" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn unknown_reset_token_is_rejected() {
    let app = spawn_default();

    let response = app
        .server
        .post("/api/auth/reset")
        .json(&json!({ "token": "no-such-token", "new_password": "N3w!Passw0rd" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn forgot_normalizes_the_email() {
    let app = spawn_default();
    signup(&app.server, "case@example.com", "0ld!Passw0rd").await;

    let response = app
        .server
        .post("/api/auth/forgot")
        .json(&json!({ "email": "  CASE@Example.Com " }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(app.mailer.last_url_for("case@example.com").is_some());
}
