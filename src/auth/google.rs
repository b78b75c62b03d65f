use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("key set fetch failed: {0}")]
    KeyFetch(String),
    #[error("unknown signing key: {0}")]
    UnknownKey(String),
    #[error("{0}")]
    Invalid(String),
    #[error("token carries no email claim")]
    MissingEmail,
}

/// Verifies a third-party ID token and extracts the identity it asserts.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError>;
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifier backed by Google's published JWKS.
///
/// Keys are fetched on first use and refreshed whenever a token names a key
/// id that is not cached, which covers Google's key rotation.
pub struct GoogleTokenVerifier {
    http: reqwest::Client,
    client_id: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            keys: RwLock::new(HashMap::new()),
        }
    }

    async fn has_key(&self, kid: &str) -> bool {
        self.keys.read().await.contains_key(kid)
    }

    async fn refresh_keys(&self) -> Result<(), GoogleAuthError> {
        let response: JwksResponse = self
            .http
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .map_err(|e| GoogleAuthError::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| GoogleAuthError::KeyFetch(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        keys.insert(jwk.kid.clone(), key);
                    }
                    Err(e) => {
                        warn!(kid = %jwk.kid, error = %e, "skipping unparseable google jwk");
                    }
                }
            }
        }

        info!(count = keys.len(), "refreshed google signing keys");
        Ok(())
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let header =
            decode_header(id_token).map_err(|e| GoogleAuthError::Invalid(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| GoogleAuthError::Invalid("missing kid in token header".to_string()))?;

        if !self.has_key(&kid).await {
            self.refresh_keys().await?;
        }

        let keys = self.keys.read().await;
        let key = keys
            .get(&kid)
            .ok_or_else(|| GoogleAuthError::UnknownKey(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);

        let data = decode::<GoogleClaims>(id_token, key, &validation)
            .map_err(|e| GoogleAuthError::Invalid(e.to_string()))?;

        let claims = data.claims;
        let email = claims.email.ok_or(GoogleAuthError::MissingEmail)?;

        Ok(GoogleIdentity {
            sub: claims.sub,
            email,
            name: claims.name,
        })
    }
}
