//! Candidate intake: validates the employer's form, stores the candidate and
//! emails them the referral link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::mailer::Mailer;
use crate::models::candidate::{Candidate, Channel, MessageEntry, MessageStatus};
use crate::store::{CandidatePatch, CandidateSelector, Store};
use crate::validation::{looks_like_email, non_blank};

pub mod email;
pub mod handlers;

use email::{referral_link, referral_request_email};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidateRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCandidate {
    pub candidate: Candidate,
    pub referral_link: String,
}

pub async fn create_candidate(
    store: &dyn Store,
    mailer: &dyn Mailer,
    public_base_url: &str,
    request: NewCandidateRequest,
    now: DateTime<Utc>,
) -> Result<CreatedCandidate, AppError> {
    let full_name = non_blank(request.full_name)
        .ok_or_else(|| AppError::Validation("Missing fullName".to_string()))?;
    let email = non_blank(request.email)
        .map(|e| e.to_lowercase())
        .filter(|e| looks_like_email(e))
        .ok_or_else(|| AppError::Validation("Missing/invalid email".to_string()))?;
    let company_name = non_blank(request.company_name);

    mailer.ensure_configured()?;

    let candidate = Candidate::new_intake(full_name, email, company_name, now);
    store.create_candidate(&candidate).await?;
    info!("Candidate {} added", candidate.id);

    let link = referral_link(public_base_url, &candidate.referral_token);
    let message = referral_request_email(&candidate, &link);
    let sent = mailer.send(&message).await;

    let (status, label) = match &sent {
        Ok(()) => (MessageStatus::Sent, "Referral request email sent"),
        Err(e) => {
            warn!("Referral request email to candidate {} failed: {e}", candidate.id);
            (MessageStatus::Failed, "Referral request email failed")
        }
    };
    store
        .update_candidate(
            &CandidateSelector::Id(candidate.id),
            &CandidatePatch::new(now)
                .message(MessageEntry {
                    at: now,
                    channel: Channel::Email,
                    subject: message.subject.clone(),
                    status,
                })
                .activity(label),
        )
        .await?;
    sent?;

    let candidate = store
        .find_by_id(candidate.id)
        .await?
        .unwrap_or(candidate);

    Ok(CreatedCandidate {
        candidate,
        referral_link: link,
    })
}
