//! Referral intake: the candidate submits their reference's contact details
//! through the tokenized link, and the reference call is placed right away.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::calls::{CallInitiator, ReferenceCallRequest};
use crate::errors::AppError;
use crate::models::candidate::{status, Referral, Stage, TaskName, TaskStatus};
use crate::store::{CandidatePatch, CandidateSelector, Store};
use crate::validation::non_blank;

pub mod handlers;

const DEFAULT_COMPANY_NAME: &str = "Company";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSubmission {
    pub ref_name: Option<String>,
    pub ref_phone: Option<String>,
    pub ref_email: Option<String>,
}

/// Stores the referral and starts the reference call. Returns the call id.
///
/// The referral write is kept when the call cannot be placed, so an operator
/// can retry the call without asking the candidate again.
pub async fn submit_referral(
    store: &dyn Store,
    caller: &dyn CallInitiator,
    token: &str,
    submission: ReferralSubmission,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let phone = non_blank(submission.ref_phone)
        .ok_or_else(|| AppError::Validation("Referral phone is required".to_string()))?;
    let name = non_blank(submission.ref_name);
    let email = non_blank(submission.ref_email);

    let candidate = store
        .find_by_token(token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid or expired link".to_string()))?;
    let selector = CandidateSelector::Token(token.to_string());

    store
        .update_candidate(
            &selector,
            &CandidatePatch::new(now)
                .referral(Referral {
                    name: name.clone().unwrap_or_default(),
                    phone: phone.clone(),
                    email: email.clone().unwrap_or_default(),
                })
                .stage(Stage::ReferralOutreach)
                .status(status::REFERRALS_SUBMITTED)
                .task(TaskName::IntakeForm, TaskStatus::Done)
                .task(TaskName::ReferralContacted, TaskStatus::Waiting)
                .activity("Referral info submitted"),
        )
        .await?;

    let request = ReferenceCallRequest {
        candidate_id: Some(candidate.id),
        candidate_name: candidate.full_name.clone(),
        company_name: candidate
            .company_name
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string()),
        reference_phone: phone,
        reference_name: name,
        reference_email: email,
    };

    let call_id = match caller.start_reference_call(&request).await {
        Ok(call_id) => call_id,
        Err(e) => {
            warn!("Could not start reference call for candidate {}: {e}", candidate.id);
            store
                .update_candidate(
                    &selector,
                    &CandidatePatch::new(now).activity("Reference call could not be started"),
                )
                .await?;
            return Err(e.into());
        }
    };

    store
        .update_candidate(
            &selector,
            &CandidatePatch::new(now)
                .active_call_id(&call_id)
                .status(status::REF_CALL_IN_PROGRESS)
                .task(TaskName::ReferralContacted, TaskStatus::Done)
                .task(TaskName::ReferralResponses, TaskStatus::Waiting)
                .activity(format!("Reference call started (callId: {call_id})")),
        )
        .await?;

    info!("Reference call {call_id} tracked on candidate {}", candidate.id);
    Ok(call_id)
}
