use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// When unset the server falls back to the in-memory store.
    pub uri: Option<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth_limit: u64,
    pub auth_window_secs: u64,
    pub reset_limit: u64,
    pub reset_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub mongo: MongoConfig,
    pub smtp: Option<SmtpConfig>,
    pub rate_limit: RateLimitConfig,
    pub frontend_url: String,
    pub google_client_id: Option<String>,
    /// Lowercased emails allowed to sign in; `None` disables the whitelist.
    pub email_whitelist: Option<HashSet<String>>,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "trendscout".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "trendscout-users".into()),
            access_ttl_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 120),
            refresh_ttl_days: env_parse("REFRESH_TOKEN_EXPIRE_DAYS", 7),
        };

        let mongo = MongoConfig {
            uri: std::env::var("MONGO_URI").ok().filter(|v| !v.is_empty()),
            database: std::env::var("MONGO_DB").unwrap_or_else(|_| "trendscout".into()),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: env_parse("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_address: std::env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@trendscout.app".into()),
            }),
            _ => None,
        };

        let rate_limit = RateLimitConfig {
            enabled: env_parse("RATE_LIMIT_ENABLED", true),
            auth_limit: env_parse("AUTH_RATE_LIMIT", 5),
            auth_window_secs: env_parse("AUTH_RATE_WINDOW_SECS", 60),
            reset_limit: env_parse("RESET_RATE_LIMIT", 3),
            reset_window_secs: env_parse("RESET_RATE_WINDOW_SECS", 900),
        };

        let email_whitelist = if env_parse("ENABLE_EMAIL_WHITELIST", false) {
            let emails = std::env::var("WHITELISTED_EMAILS").unwrap_or_default();
            Some(
                emails
                    .split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect(),
            )
        } else {
            None
        };

        Ok(Self {
            jwt,
            mongo,
            smtp,
            rate_limit,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            email_whitelist,
        })
    }

    /// Whitelist check; a disabled whitelist allows everyone.
    pub fn is_email_allowed(&self, email: &str) -> bool {
        match &self.email_whitelist {
            Some(allowed) => allowed.contains(&email.to_lowercase()),
            None => true,
        }
    }
}
