use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calls::ReferenceCallRequest;
use crate::errors::AppError;
use crate::models::call::CallRecord;
use crate::state::AppState;
use crate::validation::non_blank;

const RECENT_CALLS_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallBody {
    pub candidate_id: Option<String>,
    pub candidate_name: Option<String>,
    pub company_name: Option<String>,
    pub reference_phone: Option<String>,
    pub reference_name: Option<String>,
    pub reference_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallResponse {
    pub success: bool,
    pub call_id: String,
}

/// POST /api/vapi/start-reference-call
pub async fn handle_start_reference_call(
    State(state): State<AppState>,
    body: Result<Json<StartCallBody>, JsonRejection>,
) -> Result<Json<StartCallResponse>, AppError> {
    let Json(body) = body?;
    let (Some(candidate_name), Some(company_name), Some(reference_phone)) = (
        non_blank(body.candidate_name),
        non_blank(body.company_name),
        non_blank(body.reference_phone),
    ) else {
        return Err(AppError::Validation(
            "Missing candidateName, companyName, or referencePhone".to_string(),
        ));
    };

    let request = ReferenceCallRequest {
        candidate_id: body
            .candidate_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id.trim()).ok()),
        candidate_name,
        company_name,
        reference_phone,
        reference_name: non_blank(body.reference_name),
        reference_email: non_blank(body.reference_email),
    };

    let call_id = state.caller.start_reference_call(&request).await?;
    Ok(Json(StartCallResponse {
        success: true,
        call_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallsQuery {
    pub candidate_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallsResponse {
    pub ok: bool,
    pub results: Vec<CallRecord>,
}

/// GET /api/calls?candidate_name=
pub async fn handle_list_calls(
    State(state): State<AppState>,
    Query(params): Query<CallsQuery>,
) -> Result<Json<CallsResponse>, AppError> {
    let results = state
        .store
        .list_call_records(params.candidate_name.as_deref(), RECENT_CALLS_LIMIT)
        .await?;
    Ok(Json(CallsResponse { ok: true, results }))
}
