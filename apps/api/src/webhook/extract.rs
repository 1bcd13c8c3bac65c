//! Field extraction from call-provider webhook payloads.
//!
//! The provider has moved fields around between API versions, so every logical
//! field has an ordered list of payload paths. Paths are tried in order and the
//! first present value wins. "Present" means not missing, not null and not an
//! empty string. A field with no present path is `None`, never an error.

use serde_json::{Map, Value};
use uuid::Uuid;

/// A location in the payload, as a sequence of object keys.
type Path = &'static [&'static str];

pub const END_OF_CALL_REPORT: &str = "end-of-call-report";
const UNKNOWN_EVENT: &str = "unknown";

const CALL_ID: &[Path] = &[
    &["callId"],
    &["call", "id"],
    &["id"],
    &["message", "call", "id"],
    &["message", "callId"],
    &["message", "id"],
];

const EVENT_TYPE: &[Path] = &[
    &["message", "type"],
    &["type"],
    &["event"],
    &["name"],
    &["status"],
];

const SUMMARY: &[Path] = &[&["message", "analysis", "summary"], &["message", "summary"]];

const TRANSCRIPT: &[Path] = &[
    &["message", "artifact", "transcript"],
    &["message", "transcript"],
];

const RECORDING_URL: &[Path] = &[
    &["message", "recordingUrl"],
    &["message", "artifact", "recordingUrl"],
    &["message", "artifact", "recording", "mono", "combinedUrl"],
];

const VARIABLES: &[Path] = &[
    &["message", "artifact", "variableValues"],
    &["message", "variableValues"],
    &["message", "call", "assistantOverrides", "variableValues"],
];

const SUCCESS_EVALUATION: &[Path] = &[
    &["message", "analysis", "successEvaluation"],
    &["analysis", "successEvaluation"],
    &["message", "successEvaluation"],
    &["successEvaluation"],
];

const ENDED_REASON: &[Path] = &[&["message", "endedReason"]];
const STARTED_AT: &[Path] = &[&["message", "startedAt"]];
const ENDED_AT: &[Path] = &[&["message", "endedAt"]];
const DURATION_SECONDS: &[Path] = &[&["message", "durationSeconds"]];

fn lookup<'a>(payload: &'a Value, path: Path) -> Option<&'a Value> {
    path.iter().try_fold(payload, |value, key| value.get(key))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn first_present<'a>(payload: &'a Value, paths: &[Path]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(payload, *path))
        .find(|value| is_present(value))
}

/// First present value that reads as text. Numbers are rendered, since some
/// provider versions send numeric ids.
fn first_text(payload: &Value, paths: &[Path]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(payload, *path))
        .filter(|value| is_present(value))
        .find_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn first_object(payload: &Value, paths: &[Path]) -> Option<Map<String, Value>> {
    paths
        .iter()
        .filter_map(|path| lookup(payload, *path))
        .find_map(|value| value.as_object().cloned())
}

fn first_number(payload: &Value, paths: &[Path]) -> Option<f64> {
    paths
        .iter()
        .filter_map(|path| lookup(payload, *path))
        .find_map(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Normalized view of one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub call_id: Option<String>,
    pub event_type: String,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    /// Variables supplied when the call was created (`candidate_id`, ...).
    pub variables: Map<String, Value>,
    pub success_evaluation: Option<Value>,
    pub ended_reason: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl CallEvent {
    pub fn extract(payload: &Value) -> Self {
        CallEvent {
            call_id: first_text(payload, CALL_ID),
            event_type: first_text(payload, EVENT_TYPE).unwrap_or_else(|| UNKNOWN_EVENT.to_string()),
            summary: first_text(payload, SUMMARY),
            transcript: first_text(payload, TRANSCRIPT),
            recording_url: first_text(payload, RECORDING_URL),
            variables: first_object(payload, VARIABLES).unwrap_or_default(),
            success_evaluation: first_present(payload, SUCCESS_EVALUATION).cloned(),
            ended_reason: first_text(payload, ENDED_REASON),
            started_at: first_text(payload, STARTED_AT),
            ended_at: first_text(payload, ENDED_AT),
            duration_seconds: first_number(payload, DURATION_SECONDS),
        }
    }

    pub fn is_end_of_call(&self) -> bool {
        self.event_type == END_OF_CALL_REPORT
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The candidate id passed at call creation, if it is a well-formed id.
    pub fn candidate_id(&self) -> Option<Uuid> {
        self.variable("candidate_id")
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}
