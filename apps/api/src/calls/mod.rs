//! Outbound Call Initiator: places the automated reference call through the
//! voice-agent provider and hands back the provider's call id.
//!
//! No retries: a failed call surfaces to the caller, and an operator can
//! trigger it again.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::VapiConfig;

pub mod handlers;

const VAPI_CALL_URL: &str = "https://api.vapi.ai/call";

/// Response locations that have carried the call id, in priority order.
const CALL_ID_PATHS: &[&[&str]] = &[&["id"], &["callId"], &["call", "id"], &["data", "id"]];

#[derive(Debug, Error)]
pub enum CallError {
    #[error("invalid call request: {0}")]
    InvalidRequest(String),

    #[error("call provider is not configured: missing {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("call provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("call provider did not return a call id")]
    MissingCallId { raw: Value },
}

/// Everything the voice agent needs to run one reference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCallRequest {
    pub candidate_id: Option<Uuid>,
    pub candidate_name: String,
    pub company_name: String,
    pub reference_phone: String,
    pub reference_name: Option<String>,
    pub reference_email: Option<String>,
}

impl ReferenceCallRequest {
    /// Variables handed to the assistant; they come back on the webhook.
    pub fn variable_values(&self) -> Value {
        json!({
            "candidate_id": self.candidate_id.map(|id| id.to_string()).unwrap_or_default(),
            "candidate_name": self.candidate_name,
            "company_name": self.company_name,
            "reference_name": self.reference_name.clone().unwrap_or_default(),
            "reference_email": self.reference_email.clone().unwrap_or_default(),
            "reference_phone": self.reference_phone,
        })
    }
}

#[async_trait]
pub trait CallInitiator: Send + Sync {
    /// Starts the call and returns the provider's call id.
    async fn start_reference_call(&self, request: &ReferenceCallRequest)
        -> Result<String, CallError>;
}

/// Vapi-backed call initiator.
pub struct VapiCaller {
    client: Client,
    config: VapiConfig,
}

impl VapiCaller {
    pub fn new(config: VapiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CallInitiator for VapiCaller {
    async fn start_reference_call(
        &self,
        request: &ReferenceCallRequest,
    ) -> Result<String, CallError> {
        if request.reference_phone.trim().is_empty() {
            return Err(CallError::InvalidRequest(
                "referencePhone must not be empty".to_string(),
            ));
        }
        let api_key = required(&self.config.api_key, "VAPI_API_KEY")?;
        let phone_number_id = required(&self.config.phone_number_id, "VAPI_PHONE_NUMBER_ID")?;
        let assistant_id = required(&self.config.assistant_id, "VAPI_ASSISTANT_ID")?;

        let body = json!({
            "phoneNumberId": phone_number_id,
            "customer": { "number": request.reference_phone.trim() },
            "assistantId": assistant_id,
            "assistantOverrides": { "variableValues": request.variable_values() },
        });

        let response = self
            .client
            .post(VAPI_CALL_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Vapi call creation failed with {status}: {message}");
            return Err(CallError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: Value = response.json().await?;
        let call_id = extract_call_id(&raw).ok_or(CallError::MissingCallId { raw })?;

        info!(
            "Reference call {call_id} started for candidate {}",
            request.candidate_name
        );
        Ok(call_id)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, CallError> {
    value
        .as_deref()
        .ok_or_else(|| CallError::NotConfigured(name.to_string()))
}

fn extract_call_id(response: &Value) -> Option<String> {
    CALL_ID_PATHS.iter().find_map(|path| {
        path.iter()
            .try_fold(response, |value, key| value.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}
