//! Fixed-window request throttling for the auth route classes.

pub mod memory;
pub mod mongo;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

pub use memory::MemoryCounterStore;
pub use mongo::MongoCounterStore;

/// One route class's budget: at most `limit` requests per `window_secs`.
#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub limit: u64,
    pub window_secs: u64,
}

/// Counter storage. `incr` must be atomic per key: two concurrent calls
/// may never observe the same count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Bumps the counter for `key` in the window starting at `window_start`,
    /// resetting any stale window first, and returns the new count.
    async fn incr(&self, key: &str, window_start: u64) -> Result<u64, String>;
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Admission check for one request. A counter-store failure admits the
    /// request with a logged warning (fail-open).
    pub async fn allow(&self, class: &str, client_key: &str, policy: WindowPolicy) -> bool {
        if !self.enabled || policy.window_secs == 0 {
            return true;
        }
        let now = unix_now();
        let window_start = now - now % policy.window_secs;
        let key = format!("{class}:{client_key}");
        match self.store.incr(&key, window_start).await {
            Ok(count) if count > policy.limit => {
                warn!(key = %key, count, limit = policy.limit, "rate limit exceeded");
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "rate limit store unreachable, allowing request");
                true
            }
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Client identity for throttling: the first `X-Forwarded-For` hop when a
/// proxy supplies one, otherwise the peer address.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn throttle_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let policy = WindowPolicy {
        limit: state.config.rate_limit.auth_limit,
        window_secs: state.config.rate_limit.auth_window_secs,
    };
    enforce(&state, "auth", policy, request, next).await
}

pub async fn throttle_password_reset(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let policy = WindowPolicy {
        limit: state.config.rate_limit.reset_limit,
        window_secs: state.config.rate_limit.reset_window_secs,
    };
    enforce(&state, "reset", policy, request, next).await
}

async fn enforce(
    state: &AppState,
    class: &str,
    policy: WindowPolicy,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if state.limiter.allow(class, &key, policy).await {
        next.run(request).await
    } else {
        ApiError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn incr(&self, _key: &str, _window_start: u64) -> Result<u64, String> {
            Err("connection refused".to_string())
        }
    }

    fn policy(limit: u64) -> WindowPolicy {
        WindowPolicy {
            limit,
            window_secs: 3600,
        }
    }

    #[tokio::test]
    async fn sixth_request_in_a_window_is_denied() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), true);
        for _ in 0..5 {
            assert!(limiter.allow("auth", "1.2.3.4", policy(5)).await);
        }
        assert!(!limiter.allow("auth", "1.2.3.4", policy(5)).await);
    }

    #[tokio::test]
    async fn route_classes_count_separately() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), true);
        assert!(limiter.allow("auth", "1.2.3.4", policy(1)).await);
        assert!(!limiter.allow("auth", "1.2.3.4", policy(1)).await);
        assert!(limiter.allow("reset", "1.2.3.4", policy(1)).await);
    }

    #[tokio::test]
    async fn client_keys_count_separately() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), true);
        assert!(limiter.allow("auth", "1.2.3.4", policy(1)).await);
        assert!(limiter.allow("auth", "5.6.7.8", policy(1)).await);
    }

    #[tokio::test]
    async fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), false);
        for _ in 0..10 {
            assert!(limiter.allow("auth", "1.2.3.4", policy(1)).await);
        }
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let limiter = RateLimiter::new(Arc::new(FailingStore), true);
        for _ in 0..10 {
            assert!(limiter.allow("auth", "1.2.3.4", policy(1)).await);
        }
    }
}
