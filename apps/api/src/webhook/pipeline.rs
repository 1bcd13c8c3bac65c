//! Webhook ingestion pipeline.
//!
//! Every delivery is appended to the raw event log first. Only an
//! `end-of-call-report` with a call id goes further: it is judged for
//! completeness, classified when there is something to classify, written to
//! the call record collection, and finally moves the matching candidate along.
//!
//! Nothing in here returns an error to the caller. The provider redelivers on
//! any non-2xx response, and the raw event is already stored for later
//! reconciliation, so failures are logged and swallowed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::models::call::{CallRecord, RawEvent};
use crate::models::candidate::{status, ReferenceCall, Stage, TaskName, TaskStatus, Verdict};
use crate::sentiment::{SentimentClassifier, VerdictResult};
use crate::store::{CandidatePatch, CandidateSelector, Store};
use crate::webhook::extract::CallEvent;

/// Transcripts shorter than this (trimmed, in characters) count as "nobody talked".
pub const MIN_TRANSCRIPT_CHARS: usize = 40;

/// Ended-reason fragments that mean the reference was never reached.
const NO_CONTACT_SIGNATURES: &[&str] = &[
    "no-answer",
    "no_answer",
    "did-not-answer",
    "did_not_answer",
    "voicemail",
    "busy",
    "timeout",
    "failed",
];

const REASON_INCOMPLETE: &str = "Reference did not answer / call incomplete";
const REASON_NEGATIVE: &str = "Negative reference";

/// Heuristic guess at whether the call reached a human. A long voicemail
/// greeting can still pass the transcript check when the ended reason is
/// uninformative; treat the result as a triage hint.
pub fn is_call_incomplete(ended_reason: Option<&str>, transcript: Option<&str>) -> bool {
    let reason = ended_reason.unwrap_or_default().to_lowercase();
    let looks_no_answer = NO_CONTACT_SIGNATURES.iter().any(|sig| reason.contains(sig));

    let transcript_len = transcript.map_or(0, |t| t.trim().chars().count());

    looks_no_answer || transcript_len < MIN_TRANSCRIPT_CHARS
}

/// Candidate-facing consequences of one finished call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub stage: Stage,
    pub status: &'static str,
    pub human_check_needed: bool,
    pub human_check_reasons: Vec<String>,
    pub referral_responses: TaskStatus,
    pub activity_label: &'static str,
}

impl Transition {
    pub fn decide(incomplete: bool, verdict: Verdict) -> Self {
        let mut reasons = Vec::new();
        if incomplete {
            reasons.push(REASON_INCOMPLETE.to_string());
        } else if verdict == Verdict::Fail {
            reasons.push(REASON_NEGATIVE.to_string());
        }

        let (stage, status, activity_label) = match (incomplete, verdict) {
            (true, _) => (
                Stage::ReferralOutreach,
                status::REF_CALL_NO_ANSWER,
                "Reference call ended (no answer, needs follow-up)",
            ),
            (false, Verdict::Pass) => (
                Stage::Decision,
                status::REF_CALL_PASSED,
                "Reference call ended (PASS)",
            ),
            (false, Verdict::Fail) => (
                Stage::Decision,
                status::REF_CALL_FAILED,
                "Reference call ended (FAIL)",
            ),
        };

        Transition {
            stage,
            status,
            human_check_needed: verdict == Verdict::Fail || incomplete,
            human_check_reasons: reasons,
            referral_responses: if incomplete {
                TaskStatus::Waiting
            } else {
                TaskStatus::Done
            },
            activity_label,
        }
    }
}

/// What the pipeline did with one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Logged only: not a terminal event, or no call id.
    Recorded,
    /// Terminal event processed. `matched` is false when no candidate was found.
    Processed {
        verdict: VerdictResult,
        transition: Transition,
        matched: bool,
    },
    /// Terminal event whose processing failed after the raw event was logged.
    Failed,
}

pub async fn ingest(
    store: &dyn Store,
    classifier: &dyn SentimentClassifier,
    payload: Value,
    received_at: DateTime<Utc>,
) -> IngestOutcome {
    let event = CallEvent::extract(&payload);
    info!(
        "Webhook received: type={} call_id={}",
        event.event_type,
        event.call_id.as_deref().unwrap_or("-")
    );

    let raw = RawEvent {
        call_id: event.call_id.clone(),
        event_type: event.event_type.clone(),
        received_at,
        payload,
    };
    if let Err(e) = store.append_raw_event(&raw).await {
        error!("Failed to append raw webhook event: {e:?}");
    }

    let Some(call_id) = event.call_id.as_deref() else {
        return IngestOutcome::Recorded;
    };
    if !event.is_end_of_call() {
        return IngestOutcome::Recorded;
    }

    match process_end_of_call(store, classifier, call_id, &event, received_at).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to process end-of-call report for {call_id}: {e:?}");
            IngestOutcome::Failed
        }
    }
}

async fn process_end_of_call(
    store: &dyn Store,
    classifier: &dyn SentimentClassifier,
    call_id: &str,
    event: &CallEvent,
    now: DateTime<Utc>,
) -> Result<IngestOutcome> {
    let incomplete = is_call_incomplete(event.ended_reason.as_deref(), event.transcript.as_deref());
    let summary = event.summary.as_deref().filter(|s| !s.trim().is_empty());

    // No classifier call for silence or a missing summary.
    let verdict = match summary {
        _ if incomplete => VerdictResult::fail("incomplete_call"),
        None => VerdictResult::fail("missing_summary"),
        Some(summary) => classifier
            .classify(summary, event.transcript.as_deref())
            .await
            .into(),
    };
    let transition = Transition::decide(incomplete, verdict.verdict);

    info!(
        "Call {call_id}: incomplete={incomplete} verdict={} source={}",
        verdict.verdict.as_str(),
        verdict.source
    );

    store
        .upsert_call_record(&CallRecord {
            call_id: call_id.to_string(),
            verdict: verdict.verdict,
            verdict_source: verdict.source.clone(),
            verdict_raw: verdict.raw.clone(),
            summary: event.summary.clone(),
            transcript: event.transcript.clone(),
            recording_url: event.recording_url.clone(),
            success_evaluation: event.success_evaluation.clone(),
            ended_reason: event.ended_reason.clone(),
            started_at: event.started_at.clone(),
            ended_at: event.ended_at.clone(),
            duration_seconds: event.duration_seconds,
            candidate_name: event.variable("candidate_name").map(String::from),
            company_name: event.variable("company_name").map(String::from),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let patch = CandidatePatch::new(now)
        .reference_call(ReferenceCall {
            call_id: call_id.to_string(),
            summary: event.summary.clone(),
            transcript: event.transcript.clone(),
            recording_url: event.recording_url.clone(),
            verdict: verdict.verdict,
            verdict_source: verdict.source.clone(),
            verdict_raw: verdict.raw.clone(),
            success_evaluation: event.success_evaluation.clone(),
            ended_reason: event.ended_reason.clone(),
            started_at: event.started_at.clone(),
            ended_at: event.ended_at.clone(),
            duration_seconds: event.duration_seconds,
        })
        .status(transition.status)
        .stage(transition.stage)
        .human_check(
            transition.human_check_needed,
            transition.human_check_reasons.clone(),
        )
        .task(TaskName::ReferralContacted, TaskStatus::Done)
        .task(TaskName::ReferralResponses, transition.referral_responses)
        .activity(transition.activity_label);

    let matched = update_matching_candidate(store, call_id, event, &patch).await?;
    if !matched {
        warn!("No candidate matched call {call_id}; candidate left unchanged");
    }

    Ok(IngestOutcome::Processed {
        verdict,
        transition,
        matched,
    })
}

/// Candidate id from the call variables first, then the stored active call id.
async fn update_matching_candidate(
    store: &dyn Store,
    call_id: &str,
    event: &CallEvent,
    patch: &CandidatePatch,
) -> Result<bool> {
    if let Some(candidate_id) = event.candidate_id() {
        if store
            .update_candidate(&CandidateSelector::Id(candidate_id), patch)
            .await?
            > 0
        {
            info!("Call {call_id} applied to candidate {candidate_id}");
            return Ok(true);
        }
    }

    let matched = store
        .update_candidate(&CandidateSelector::ActiveCallId(call_id.to_string()), patch)
        .await?;
    Ok(matched > 0)
}
