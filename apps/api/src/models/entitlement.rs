use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per accepted payment. Never deleted; becomes unusable once expired
/// or exhausted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entitlement {
    pub id: Uuid,
    pub identity: String,
    pub transaction_id: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub amount_paid: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_count: i32,
    pub max_usage: i32,
}

impl Entitlement {
    pub fn remaining_uses(&self) -> i32 {
        (self.max_usage - self.usage_count).max(0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Values for a fresh entitlement row, built by payment intake.
#[derive(Debug, Clone)]
pub struct NewEntitlement {
    pub id: Uuid,
    pub identity: String,
    pub transaction_id: String,
    pub token: String,
    pub amount_paid: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_usage: i32,
}
