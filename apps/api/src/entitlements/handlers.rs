use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::entitlements::validator::{validate_token, TokenValidation};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenStatusQuery {
    #[serde(default, alias = "cpf")]
    pub identity: Option<String>,
    #[serde(default, alias = "resume_token")]
    pub token: Option<String>,
}

/// GET /api/token/status
///
/// Reports whether a token would currently be accepted. Never consumes a use.
pub async fn handle_token_status(
    State(state): State<AppState>,
    Query(params): Query<TokenStatusQuery>,
) -> Result<Json<TokenValidation>, AppError> {
    let identity = non_empty(params.identity);
    let token = non_empty(params.token);
    let (Some(identity), Some(token)) = (identity, token) else {
        return Err(AppError::MissingFields(
            "identity and token are required".to_string(),
        ));
    };

    let validation =
        validate_token(state.entitlements.as_ref(), &identity, &token, Utc::now()).await?;
    Ok(Json(validation))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
