//! SMTP delivery via `lettre`.

use async_trait::async_trait;
use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

use super::Mailer;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("failed to create smtp transport: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), String> {
        let from = self
            .from_address
            .parse()
            .map_err(|e| format!("invalid from address: {e}"))?;
        let to = email
            .parse()
            .map_err(|e| format!("invalid recipient address: {e}"))?;

        let text = format!("Reset your password using this link (valid for 1 hour): {reset_url}");
        let html = format!(
            "<p>Reset your password using this link (valid for 1 hour):</p>\
             <p><a href=\"{reset_url}\">{reset_url}</a></p>"
        );

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject("Reset your TrendScout password")
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|e| format!("failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("failed to send email: {e}"))?;

        info!(email = %email, "password reset email sent");
        Ok(())
    }
}
