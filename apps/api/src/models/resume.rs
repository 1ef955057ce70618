use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A resolved profile document. At most one row per `(identity, profile_url)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedResume {
    pub id: Uuid,
    pub identity: String,
    pub profile_url: String,
    pub document: Value,
    pub created_at: DateTime<Utc>,
}
