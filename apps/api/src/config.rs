use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_MODEL;

/// Mail provider credentials. Checked when an email is about to be sent.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub from: Option<String>,
}

/// Voice-agent provider settings. All three are needed to place a call.
#[derive(Debug, Clone, Default)]
pub struct VapiConfig {
    pub api_key: Option<String>,
    pub phone_number_id: Option<String>,
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub model: String,
}

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` is required at startup; provider credentials are
/// checked by the operation that needs them.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Used to build the referral link sent to candidates.
    pub public_base_url: String,
    /// Shared secret expected in `x-webhook-token`, when set.
    pub webhook_token: Option<String>,
    pub mail: MailConfig,
    pub vapi: VapiConfig,
    pub classifier: ClassifierConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            None => 8080,
        };

        Ok(Config {
            database_url: get("DATABASE_URL")
                .context("Required environment variable 'DATABASE_URL' is not set")?,
            port,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            webhook_token: get("WEBHOOK_TOKEN"),
            mail: MailConfig {
                api_key: get("RESEND_API_KEY"),
                from: get("EMAIL_FROM"),
            },
            vapi: VapiConfig {
                api_key: get("VAPI_API_KEY"),
                phone_number_id: get("VAPI_PHONE_NUMBER_ID"),
                assistant_id: get("VAPI_ASSISTANT_ID"),
            },
            classifier: ClassifierConfig {
                api_key: get("ANTHROPIC_API_KEY"),
                model: get("CLASSIFIER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
        })
    }
}
