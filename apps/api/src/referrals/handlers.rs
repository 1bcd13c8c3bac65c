use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::referrals::{submit_referral, ReferralSubmission};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub success: bool,
    pub call_id: String,
}

/// POST /api/referrals/:token
pub async fn handle_submit_referral(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Result<Json<ReferralSubmission>, JsonRejection>,
) -> Result<Json<ReferralResponse>, AppError> {
    let Json(submission) = body?;
    let call_id = submit_referral(
        state.store.as_ref(),
        state.caller.as_ref(),
        &token,
        submission,
        Utc::now(),
    )
    .await?;
    Ok(Json(ReferralResponse {
        success: true,
        call_id,
    }))
}
