use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::{create_candidate, CreatedCandidate, NewCandidateRequest};
use crate::models::candidate::Candidate;
use crate::state::AppState;

/// POST /api/candidates
/// POST /api/workflows/start
pub async fn handle_create_candidate(
    State(state): State<AppState>,
    body: Result<Json<NewCandidateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedCandidate>), AppError> {
    let Json(req) = body?;
    let created = create_candidate(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.public_base_url,
        req,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    Ok(Json(state.store.list_candidates().await?))
}

/// GET /api/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Candidate>, AppError> {
    let not_found = || AppError::NotFound(format!("Candidate {id} not found"));
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let candidate = state.store.find_by_id(uuid).await?.ok_or_else(not_found)?;
    Ok(Json(candidate))
}
