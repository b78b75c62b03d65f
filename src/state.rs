use std::sync::Arc;

use tracing::warn;

use crate::auth::google::{GoogleTokenVerifier, IdTokenVerifier};
use crate::config::AppConfig;
use crate::email::{LogMailer, Mailer, SmtpMailer};
use crate::rate_limit::{CounterStore, MemoryCounterStore, MongoCounterStore, RateLimiter};
use crate::store::{DataStore, MemoryStore, MongoStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    pub mailer: Arc<dyn Mailer>,
    pub google: Option<Arc<dyn IdTokenVerifier>>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (store, counters): (Arc<dyn DataStore>, Arc<dyn CounterStore>) =
            match config.mongo.uri.as_deref() {
                Some(uri) => {
                    let mongo = MongoStore::connect(uri, &config.mongo.database).await?;
                    let counters = MongoCounterStore::new(mongo.database()).await;
                    (Arc::new(mongo), Arc::new(counters))
                }
                None => {
                    warn!("MONGO_URI not set; using in-memory storage (data is not persisted)");
                    (
                        Arc::new(MemoryStore::new()),
                        Arc::new(MemoryCounterStore::new()),
                    )
                }
            };

        let mailer: Arc<dyn Mailer> = match config.smtp.as_ref() {
            Some(smtp) => match SmtpMailer::new(smtp) {
                Ok(mailer) => Arc::new(mailer),
                Err(e) => {
                    warn!(error = %e, "smtp transport unavailable; reset links will be logged");
                    Arc::new(LogMailer)
                }
            },
            None => {
                warn!("SMTP not configured; password reset links will be logged");
                Arc::new(LogMailer)
            }
        };

        let google: Option<Arc<dyn IdTokenVerifier>> = match config.google_client_id.clone() {
            Some(client_id) => Some(Arc::new(GoogleTokenVerifier::new(client_id))),
            None => {
                warn!("GOOGLE_CLIENT_ID not set; google sign-in disabled");
                None
            }
        };

        let limiter = Arc::new(RateLimiter::new(counters, config.rate_limit.enabled));

        Ok(Self {
            config,
            store,
            mailer,
            google,
            limiter,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DataStore>,
        mailer: Arc<dyn Mailer>,
        google: Option<Arc<dyn IdTokenVerifier>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            config,
            store,
            mailer,
            google,
            limiter,
        }
    }
}
