use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::{instrument, warn};

use crate::state::AppState;

static STARTED: OnceLock<Instant> = OnceLock::new();

pub fn router() -> Router<AppState> {
    STARTED.get_or_init(Instant::now);
    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(health_db))
        .route("/health/full", get(health_full))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[instrument(skip(state))]
async fn health_db(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "reachable" })),
        ),
        Err(e) => {
            warn!(error = %e, "database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}

#[instrument(skip(state))]
async fn health_full(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_secs = STARTED.get().map(|at| at.elapsed().as_secs()).unwrap_or(0);
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "database": "reachable",
                "uptime_secs": uptime_secs,
            })),
        ),
        Err(e) => {
            warn!(error = %e, "database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "database": "unreachable",
                    "uptime_secs": uptime_secs,
                })),
            )
        }
    }
}
