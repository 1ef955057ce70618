use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::profile_client::ProfileError;

/// Why a token was refused. Returned to the client verbatim so it can tell
/// "buy again" from "wait" from "retry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    InvalidToken,
    Expired,
    QuotaExceeded,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::InvalidToken => "INVALID_TOKEN",
            DenyReason::Expired => "EXPIRED",
            DenyReason::QuotaExceeded => "QUOTA_EXCEEDED",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            DenyReason::InvalidToken => "Token is not valid for this identity",
            DenyReason::Expired => "Token has expired",
            DenyReason::QuotaExceeded => "Token has no remaining uses",
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Missing fields: {0}")]
    MissingFields(String),

    #[error("Invalid payment status: {0}")]
    InvalidStatus(String),

    #[error("Token denied: {}", .0.code())]
    Denied(DenyReason),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Extraction timed out")]
    ExtractionTimeout,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        AppError::Denied(reason)
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Timeout(_) => AppError::ExtractionTimeout,
            other => AppError::ExtractionFailed(other.to_string()),
        }
    }
}

impl AppError {
    /// The ErrorKind surfaced in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::MissingFields(_) => "MISSING_FIELDS",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::Denied(reason) => reason.code(),
            AppError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            AppError::ExtractionTimeout => "EXTRACTION_TIMEOUT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::MissingFields(_) | AppError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            AppError::Denied(_) => StatusCode::FORBIDDEN,
            AppError::ExtractionFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ExtractionTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Unauthorized => "Invalid webhook secret".to_string(),
            AppError::MissingFields(msg) => msg.clone(),
            AppError::InvalidStatus(status) => format!("Unrecognized payment status: {status}"),
            AppError::Denied(reason) => reason.message().to_string(),
            AppError::ExtractionFailed(msg) => {
                tracing::error!("Profile extraction failed: {msg}");
                "Profile extraction failed".to_string()
            }
            AppError::ExtractionTimeout => {
                tracing::error!("Profile extraction timed out");
                "Profile extraction did not finish in time".to_string()
            }
            AppError::StoreUnavailable(e) => {
                tracing::error!("Database error: {e}");
                "The data store is unavailable".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}
