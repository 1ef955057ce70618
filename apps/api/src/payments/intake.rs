//! Payment Intake — idempotent ingestion of payment webhooks.
//!
//! Flow: secret check → event type → paid status → required fields →
//!       INSERT … ON CONFLICT (transaction_id) DO NOTHING → read-back on conflict.
//!
//! Duplicate deliveries are never an error: the provider retries until it sees
//! a 2xx, so a repeated transaction id answers with the token already issued.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EntitlementPolicy;
use crate::entitlements::store::{EntitlementStore, InsertOutcome};
use crate::entitlements::token::generate_token;
use crate::errors::AppError;
use crate::models::entitlement::NewEntitlement;
use crate::payments::webhook::{is_paid_status, secret_matches, PaymentEvent};

/// Fresh tokens tried before giving up on a token-uniqueness collision.
const MAX_TOKEN_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Not a `billing.paid` event. Acknowledged without any state change.
    Ignored,
    Accepted {
        transaction_id: String,
        token: String,
        /// True when the transaction was already recorded by an earlier delivery.
        duplicate: bool,
    },
}

pub struct PaymentIntake<'a> {
    pub store: &'a dyn EntitlementStore,
    pub policy: EntitlementPolicy,
    pub webhook_secret: &'a str,
}

impl<'a> PaymentIntake<'a> {
    pub async fn ingest(
        &self,
        provided_secret: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, AppError> {
        if !secret_matches(self.webhook_secret, provided_secret) {
            warn!("Rejected payment webhook with invalid secret");
            return Err(AppError::Unauthorized);
        }

        let event = PaymentEvent::parse_lenient(body);
        if !event.is_paid_event() {
            info!("Ignoring payment webhook event {:?}", event.event_type());
            return Ok(IntakeOutcome::Ignored);
        }

        let status = event.status();
        if !is_paid_status(&status) {
            warn!("Payment webhook with unrecognized status '{status}'");
            return Err(AppError::InvalidStatus(status));
        }

        let (Some(transaction_id), Some(identity)) = (event.transaction_id(), event.identity())
        else {
            return Err(AppError::MissingFields(
                "billing id and customer taxId are required".to_string(),
            ));
        };

        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let new = NewEntitlement {
                id: Uuid::new_v4(),
                identity: identity.clone(),
                transaction_id: transaction_id.clone(),
                token: generate_token(),
                amount_paid: event.amount_paid(),
                status: status.clone(),
                created_at: now,
                expires_at: now + self.policy.ttl,
                max_usage: self.policy.max_usage,
            };

            match self.store.insert_if_absent(&new).await? {
                InsertOutcome::Inserted(entitlement) => {
                    info!(
                        "Payment {transaction_id} recorded for identity {identity}, expires {}",
                        entitlement.expires_at
                    );
                    return Ok(IntakeOutcome::Accepted {
                        transaction_id: entitlement.transaction_id,
                        token: entitlement.token,
                        duplicate: false,
                    });
                }
                InsertOutcome::DuplicateTransaction => {
                    return self.read_back(&transaction_id, &identity).await;
                }
                InsertOutcome::TokenCollision => {
                    warn!("Token collision on attempt {attempt} for payment {transaction_id}");
                }
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "could not allocate a unique token for payment {transaction_id}"
        )))
    }

    async fn read_back(
        &self,
        transaction_id: &str,
        identity: &str,
    ) -> Result<IntakeOutcome, AppError> {
        let existing = self
            .store
            .find_by_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "payment {transaction_id} conflicted on insert but cannot be read back"
                ))
            })?;

        if existing.identity != identity {
            warn!(
                "Duplicate delivery of payment {transaction_id} names identity {identity}, \
                 entitlement is bound to {}",
                existing.identity
            );
        }
        info!("Duplicate delivery of payment {transaction_id}; returning existing token");

        Ok(IntakeOutcome::Accepted {
            transaction_id: existing.transaction_id,
            token: existing.token,
            duplicate: true,
        })
    }
}
