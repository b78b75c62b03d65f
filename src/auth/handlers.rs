use anyhow::anyhow;
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bson::{oid::ObjectId, DateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use time::Duration;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::{info, instrument, warn};

use crate::{
    activity,
    auth::{
        dto::{
            ForgotPasswordRequest, GoogleLoginRequest, LoginRequest, MessageResponse, PublicUser,
            ResetPasswordRequest, SignupRequest, TokenResponse,
        },
        jwt::{AuthUser, JwtKeys},
        password::{
            generate_reset_token, hash_password, is_strong_password, verify_password,
            PASSWORD_POLICY,
        },
    },
    error::{ApiError, Json},
    rate_limit::{throttle_auth, throttle_password_reset},
    state::AppState,
    store::User,
};

pub const REFRESH_COOKIE: &str = "refresh_token";

const FORGOT_RESPONSE: &str = "If an account exists, an email was sent";
const RESET_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn router(state: AppState) -> Router<AppState> {
    let throttled = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/google", post(google_login))
        .route("/refresh", post(refresh))
        .layer(middleware::from_fn_with_state(state.clone(), throttle_auth));

    let reset = Router::new()
        .route("/forgot", post(forgot_password))
        .route("/reset", post(reset_password))
        .layer(middleware::from_fn_with_state(
            state,
            throttle_password_reset,
        ));

    let open = Router::new()
        .route("/me", get(get_me))
        .route("/logout", post(logout));

    throttled.merge(reset).merge(open)
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn ensure_email_allowed(state: &AppState, email: &str) -> Result<(), ApiError> {
    if state.config.is_email_allowed(email) {
        Ok(())
    } else {
        warn!(email = %email, "email not whitelisted");
        Err(ApiError::Forbidden("Email not authorized for access"))
    }
}

/// SameSite/Secure pairing for the refresh cookie, derived from where the
/// frontend is served. Cross-site frontends need `SameSite=None`, which
/// browsers require `Secure` for; plain-http localhost gets `Lax`.
fn cookie_flags(frontend_url: &str) -> (SameSite, bool) {
    if frontend_url.starts_with("https://") {
        (SameSite::None, true)
    } else if frontend_url.contains("localhost") {
        (SameSite::Lax, false)
    } else {
        (SameSite::None, true)
    }
}

fn set_refresh_cookie(cookies: &Cookies, state: &AppState, token: String) {
    let (same_site, secure) = cookie_flags(&state.config.frontend_url);
    let cookie = Cookie::build((REFRESH_COOKIE, token))
        .path("/")
        .http_only(true)
        .max_age(Duration::days(state.config.jwt.refresh_ttl_days))
        .same_site(same_site)
        .secure(secure)
        .build();
    cookies.add(cookie);
}

fn clear_refresh_cookie(cookies: &Cookies, state: &AppState) {
    let (same_site, secure) = cookie_flags(&state.config.frontend_url);
    let cookie = Cookie::build((REFRESH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .same_site(same_site)
        .secure(secure)
        .build();
    cookies.add(cookie);
}

fn mint_token_pair(state: &AppState, user_id: ObjectId) -> Result<(String, String), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access = keys.sign_access(user_id)?;
    let refresh = keys.sign_refresh(user_id)?;
    Ok((access, refresh))
}

#[instrument(skip(state, cookies, payload))]
async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(mut payload): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    info!(email = %payload.email, "signup attempt");

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    ensure_email_allowed(&state, &payload.email)?;
    if !is_strong_password(&payload.password) {
        warn!(email = %payload.email, "password rejected by composition policy");
        return Err(ApiError::Validation(PASSWORD_POLICY.into()));
    }

    if state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already in use");
        return Err(ApiError::DuplicateEmail);
    }

    let hash = hash_password(&payload.password)?;
    let user = User::new_local(payload.name, payload.email, hash);

    // Both tokens are signed before the insert; whichever side fails, no
    // half-created account is left behind and the client can retry.
    let (access_token, refresh_token) = mint_token_pair(&state, user.id)?;
    state.store.insert_user(&user).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    activity::track(
        &state,
        user.id,
        "signup",
        Some(json!({ "email": user.email })),
    )
    .await;

    set_refresh_cookie(&cookies, &state, refresh_token.clone());
    let body = TokenResponse::new(access_token, refresh_token, PublicUser::from(&user));
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[instrument(skip(state, cookies, payload))]
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    info!(email = %payload.email, "login attempt");

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    ensure_email_allowed(&state, &payload.email)?;

    let user = match state.store.find_user_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(email = %payload.email, "login against oauth-only account");
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(&payload.password, hash) {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let (access_token, refresh_token) = mint_token_pair(&state, user.id)?;
    if let Err(e) = state.store.touch_last_login(user.id, DateTime::now()).await {
        warn!(user_id = %user.id, error = %e, "failed to update last login");
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    activity::track(&state, user.id, "login", Some(json!({ "method": "email" }))).await;

    set_refresh_cookie(&cookies, &state, refresh_token.clone());
    Ok(Json(TokenResponse::new(
        access_token,
        refresh_token,
        PublicUser::from(&user),
    )))
}

#[instrument(skip(state, cookies, payload))]
async fn google_login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Response, ApiError> {
    info!("google login attempt");

    let Some(id_token) = payload.id_token.filter(|t| !t.is_empty()) else {
        warn!("google login missing idToken");
        return Err(ApiError::Validation("Missing idToken".into()));
    };
    let Some(verifier) = state.google.as_ref() else {
        return Err(ApiError::Internal(anyhow!("google oauth is not configured")));
    };
    let identity = verifier.verify(&id_token).await.map_err(|e| {
        warn!(error = %e, "google token verification failed");
        ApiError::InvalidExternalToken(e.to_string())
    })?;

    let email = identity.email.trim().to_lowercase();
    ensure_email_allowed(&state, &email)?;

    let (user, created) = match state.store.find_user_by_email(&email).await? {
        Some(user) => {
            if user.google_id.is_none() {
                if let Err(e) = state.store.set_google_id(user.id, &identity.sub).await {
                    warn!(user_id = %user.id, error = %e, "failed to backfill google id");
                }
            }
            (user, false)
        }
        None => {
            let user = User::new_google(identity.name, email, identity.sub);
            state.store.insert_user(&user).await?;
            info!(user_id = %user.id, email = %user.email, "user created via google");
            (user, true)
        }
    };

    if created {
        activity::track(
            &state,
            user.id,
            "signup",
            Some(json!({ "email": user.email, "method": "google" })),
        )
        .await;
    } else {
        activity::track(
            &state,
            user.id,
            "login",
            Some(json!({ "method": "google" })),
        )
        .await;
    }

    let (access_token, refresh_token) = mint_token_pair(&state, user.id)?;
    set_refresh_cookie(&cookies, &state, refresh_token.clone());

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    info!(user_id = %user.id, created, "google login succeeded");
    let body = TokenResponse::new(access_token, refresh_token, PublicUser::from(&user));
    Ok((status, Json(body)).into_response())
}

#[instrument(skip(state, cookies))]
async fn refresh(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(cookie) = cookies.get(REFRESH_COOKIE) else {
        warn!("refresh token cookie missing");
        return Err(ApiError::Unauthorized("Refresh token not found"));
    };

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(cookie.value()).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::InvalidRefreshToken
    })?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::InvalidRefreshToken)?;

    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or(ApiError::InvalidRefreshToken)?;

    let (access_token, refresh_token) = mint_token_pair(&state, user.id)?;
    set_refresh_cookie(&cookies, &state, refresh_token.clone());

    info!(user_id = %user.id, "token pair rotated");
    Ok(Json(TokenResponse::new(
        access_token,
        refresh_token,
        PublicUser::from(&user),
    )))
}

#[instrument(skip(state, cookies))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    cookies: Cookies,
) -> Json<MessageResponse> {
    clear_refresh_cookie(&cookies, &state);
    info!(user_id = %user_id, "user logged out");
    Json(MessageResponse {
        message: "Logged out successfully",
    })
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    info!(email = %email, "password reset requested");

    // Unknown addresses get the same reply as known ones.
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        info!(email = %email, "password reset for unknown email");
        return Ok(Json(MessageResponse {
            message: FORGOT_RESPONSE,
        }));
    };

    let token = generate_reset_token();
    let expires = DateTime::from_millis(DateTime::now().timestamp_millis() + RESET_TOKEN_TTL_MS);
    if let Err(e) = state.store.set_reset_token(user.id, &token, expires).await {
        warn!(user_id = %user.id, error = %e, "failed to store reset token");
        return Ok(Json(MessageResponse {
            message: FORGOT_RESPONSE,
        }));
    }

    let reset_url = format!(
        "{}/reset-password?token={}&email={}",
        state.config.frontend_url.trim_end_matches('/'),
        token,
        user.email
    );
    if let Err(e) = state.mailer.send_password_reset(&user.email, &reset_url).await {
        warn!(email = %user.email, error = %e, "failed to send password reset email");
    }

    Ok(Json(MessageResponse {
        message: FORGOT_RESPONSE,
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("password reset attempt");

    let hash = hash_password(&payload.new_password)?;
    let user_id = state
        .store
        .consume_reset_token(&payload.token, DateTime::now(), &hash)
        .await?
        .ok_or_else(|| {
            warn!("invalid or expired password reset token");
            ApiError::InvalidResetToken
        })?;

    info!(user_id = %user_id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

#[instrument(skip(state))]
async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    activity::track(&state, user.id, "view_profile", None).await;
    Ok(Json(PublicUser::from(&user)))
}
