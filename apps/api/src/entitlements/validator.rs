//! Token Validator — decides ALLOW/DENY for an `(identity, token)` pair.
//!
//! Decision order, first failing check wins:
//! 1. no entitlement for `(identity, token)` → INVALID_TOKEN
//! 2. `now > expires_at`                     → EXPIRED
//! 3. `usage_count >= max_usage`             → QUOTA_EXCEEDED
//!
//! `check` is the pure rule. `validate_token` runs it against the store without
//! mutating anything; `authorize_and_debit` runs it and then consumes one use.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::entitlements::store::EntitlementStore;
use crate::errors::{AppError, DenyReason};
use crate::models::entitlement::Entitlement;

/// Read-only validation result, safe to return to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenValidation {
    pub valid: bool,
    pub reason: Option<DenyReason>,
    pub remaining_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Pure decision function over an already-loaded entitlement.
pub fn check(
    entitlement: Option<&Entitlement>,
    now: DateTime<Utc>,
) -> Result<&Entitlement, DenyReason> {
    let entitlement = entitlement.ok_or(DenyReason::InvalidToken)?;
    if entitlement.is_expired_at(now) {
        return Err(DenyReason::Expired);
    }
    if entitlement.usage_count >= entitlement.max_usage {
        return Err(DenyReason::QuotaExceeded);
    }
    Ok(entitlement)
}

/// Validate without consuming a use.
pub async fn validate_token(
    store: &dyn EntitlementStore,
    identity: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<TokenValidation, AppError> {
    let found = store.find_by_token(identity, token).await?;
    let validation = match check(found.as_ref(), now) {
        Ok(entitlement) => TokenValidation {
            valid: true,
            reason: None,
            remaining_uses: Some(entitlement.remaining_uses()),
            expires_at: Some(entitlement.expires_at),
        },
        Err(reason) => TokenValidation {
            valid: false,
            reason: Some(reason),
            remaining_uses: found.as_ref().map(Entitlement::remaining_uses),
            expires_at: found.as_ref().map(|e| e.expires_at),
        },
    };
    Ok(validation)
}

/// Validate, then atomically consume one use. Returns the debited row.
///
/// A request that passes `check` can still lose a race against a concurrent
/// debit on the same token; the conditional UPDATE refuses it and the row is
/// re-read so the caller sees the precise reason.
pub async fn authorize_and_debit(
    store: &dyn EntitlementStore,
    identity: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Entitlement, AppError> {
    let found = store.find_by_token(identity, token).await?;
    if let Err(reason) = check(found.as_ref(), now) {
        debug!("Token denied for identity {identity}: {}", reason.code());
        return Err(reason.into());
    }

    if let Some(debited) = store.debit(identity, token, now).await? {
        debug!(
            "Debited token for identity {identity}: {}/{}",
            debited.usage_count, debited.max_usage
        );
        return Ok(debited);
    }

    let current = store.find_by_token(identity, token).await?;
    let reason = check(current.as_ref(), now)
        .err()
        .unwrap_or(DenyReason::QuotaExceeded);
    warn!(
        "Debit refused after validation for identity {identity}: {}",
        reason.code()
    );
    Err(reason.into())
}
