//! Generate — the token-gated entry point.
//!
//! Flow: required fields → validate token → debit one use → resolve.
//!
//! Every successful validation consumes a use, whichever tier answers. A failed
//! or timed-out fetch does NOT refund it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::entitlements::store::EntitlementStore;
use crate::entitlements::validator::authorize_and_debit;
use crate::errors::AppError;
use crate::resumes::resolver::{ResolutionSource, ResumeResolver};

/// Request body. Accepts the legacy field names (`cpf`, `linkedin_url`,
/// `resume_token`) used by the existing web client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, alias = "cpf")]
    pub identity: Option<String>,
    #[serde(default, alias = "linkedin_url")]
    pub profile_url: Option<String>,
    #[serde(default, alias = "resume_token")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub source: ResolutionSource,
    pub resume: Value,
    pub usage_count: i32,
    pub max_usage: i32,
}

struct RequiredFields<'a> {
    identity: &'a str,
    profile_url: &'a str,
    token: &'a str,
}

impl GenerateRequest {
    /// Parses a raw body regardless of content type. Anything that is not an
    /// object of string fields is reported as missing fields.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::MissingFields(format!("invalid request body: {e}")))
    }

    fn required(&self) -> Result<RequiredFields<'_>, AppError> {
        match (
            non_blank(&self.identity),
            non_blank(&self.profile_url),
            non_blank(&self.token),
        ) {
            (Some(identity), Some(profile_url), Some(token)) => Ok(RequiredFields {
                identity,
                profile_url,
                token,
            }),
            _ => Err(AppError::MissingFields(
                "identity, profile_url and token are required".to_string(),
            )),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn generate_resume(
    entitlements: &dyn EntitlementStore,
    resolver: &ResumeResolver,
    request: &GenerateRequest,
    now: DateTime<Utc>,
) -> Result<GenerateResponse, AppError> {
    let RequiredFields {
        identity,
        profile_url,
        token,
    } = request.required()?;

    let debited = authorize_and_debit(entitlements, identity, token, now).await?;
    info!(
        "Generation authorized for identity {identity} ({}/{} uses)",
        debited.usage_count, debited.max_usage
    );

    let resolved = resolver.resolve(identity, profile_url, now).await?;

    Ok(GenerateResponse {
        source: resolved.source,
        resume: resolved.document,
        usage_count: debited.usage_count,
        max_usage: debited.max_usage,
    })
}
