//! Entitlement Store — durable record of purchases and their tokens.
//!
//! Two database constraints carry the concurrency story:
//! - `UNIQUE (transaction_id)` makes duplicate webhook deliveries collapse into one row.
//! - the debit is a single conditional UPDATE, so quota is re-checked atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::entitlement::{Entitlement, NewEntitlement};

const TOKEN_CONSTRAINT: &str = "entitlements_token_key";

/// Result of attempting to record a new entitlement.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Entitlement),
    /// The transaction id was already recorded; nothing was written.
    DuplicateTransaction,
    /// The generated token already exists on another row; nothing was written.
    TokenCollision,
}

/// Storage seam for entitlements. Carried in `AppState` as `Arc<dyn EntitlementStore>`.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn insert_if_absent(&self, new: &NewEntitlement) -> Result<InsertOutcome, AppError>;

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Entitlement>, AppError>;

    async fn find_by_token(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Option<Entitlement>, AppError>;

    /// Compare-and-increment: consumes one use only if the row matches
    /// `(identity, token)`, is unexpired at `now`, and still has quota.
    /// Returns the updated row, or `None` if nothing was debited.
    async fn debit(
        &self,
        identity: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, AppError>;
}

/// PostgreSQL-backed entitlement store.
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn insert_if_absent(&self, new: &NewEntitlement) -> Result<InsertOutcome, AppError> {
        let inserted = sqlx::query_as::<_, Entitlement>(
            r#"
            INSERT INTO entitlements
                (id, identity, transaction_id, token, amount_paid, status,
                 created_at, expires_at, usage_count, max_usage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9)
            ON CONFLICT (transaction_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(&new.identity)
        .bind(&new.transaction_id)
        .bind(&new.token)
        .bind(new.amount_paid)
        .bind(&new.status)
        .bind(new.created_at)
        .bind(new.expires_at)
        .bind(new.max_usage)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(row)) => Ok(InsertOutcome::Inserted(row)),
            Ok(None) => Ok(InsertOutcome::DuplicateTransaction),
            Err(sqlx::Error::Database(db_err)) if db_err.constraint() == Some(TOKEN_CONSTRAINT) => {
                Ok(InsertOutcome::TokenCollision)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        Ok(sqlx::query_as::<_, Entitlement>(
            "SELECT * FROM entitlements WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_by_token(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        Ok(sqlx::query_as::<_, Entitlement>(
            "SELECT * FROM entitlements WHERE identity = $1 AND token = $2",
        )
        .bind(identity)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn debit(
        &self,
        identity: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, AppError> {
        Ok(sqlx::query_as::<_, Entitlement>(
            r#"
            UPDATE entitlements
            SET usage_count = usage_count + 1
            WHERE identity = $1
              AND token = $2
              AND usage_count < max_usage
              AND expires_at >= $3
            RETURNING *
            "#,
        )
        .bind(identity)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }
}
