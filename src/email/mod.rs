//! Password-reset email delivery.

pub mod log;
pub mod smtp;

pub use log::LogMailer;
pub use smtp::SmtpMailer;

use async_trait::async_trait;

/// Delivers account emails. The reset URL is fully built by the caller.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), String>;
}
