//! Log-only delivery for environments without SMTP credentials.

use async_trait::async_trait;
use tracing::info;

use super::Mailer;

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), String> {
        info!(email = %email, url = %reset_url, "password reset link (smtp not configured)");
        Ok(())
    }
}
