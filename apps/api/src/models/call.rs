use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::candidate::Verdict;

/// One row per provider call id, upserted by the webhook pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub call_id: String,
    pub verdict: Verdict,
    pub verdict_source: String,
    pub verdict_raw: String,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub success_evaluation: Option<Value>,
    pub ended_reason: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Denormalized from the call's variables for operator debugging.
    pub candidate_name: Option<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit copy of one inbound webhook delivery. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub call_id: Option<String>,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}
