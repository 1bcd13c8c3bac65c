//! Outbound email through the Resend HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider is not configured: missing {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Fails with `NotConfigured` when credentials are missing. Checked before
    /// anything is persisted so a misconfigured server has no side effects.
    fn ensure_configured(&self) -> Result<(), MailError>;

    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendMailer {
    client: Client,
    config: MailConfig,
}

impl ResendMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), MailError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| MailError::NotConfigured("RESEND_API_KEY".to_string()))?;
        let from = self
            .config
            .from
            .as_deref()
            .ok_or_else(|| MailError::NotConfigured("EMAIL_FROM".to_string()))?;
        Ok((api_key, from))
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn ensure_configured(&self) -> Result<(), MailError> {
        self.credentials().map(|_| ())
    }

    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let (api_key, from) = self.credentials()?;

        let response = self
            .client
            .post(RESEND_EMAILS_URL)
            .bearer_auth(api_key)
            .json(&ResendRequest {
                from,
                to: [email.to.as_str()],
                subject: &email.subject,
                html: &email.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        info!("Sent '{}' email to {}", email.subject, email.to);
        Ok(())
    }
}
