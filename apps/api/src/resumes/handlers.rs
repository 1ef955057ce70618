use axum::{
    extract::{Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::resume::GeneratedResume;
use crate::resumes::generate::{generate_resume, GenerateRequest, GenerateResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, alias = "cpf")]
    pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub resumes: Vec<GeneratedResume>,
}

/// POST /api/generate
///
/// 400 missing fields, 403 token denied, 500/504 extraction failure, 200 with the document.
/// The body is read raw so a bad payload or content type still gets the error envelope.
pub async fn handle_generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, AppError> {
    let request = GenerateRequest::from_body(&body)?;
    let response = generate_resume(
        state.entitlements.as_ref(),
        &state.resolver,
        &request,
        Utc::now(),
    )
    .await?;
    Ok(Json(response))
}

/// GET /api/dashboard?identity=…
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let identity = params
        .identity
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("identity is required".to_string()))?;

    let resumes = state.resumes.list_for_identity(identity).await?;
    Ok(Json(DashboardResponse { resumes }))
}
