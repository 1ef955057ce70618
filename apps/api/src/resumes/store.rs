//! Durable tier: one `generated_resumes` row per `(identity, profile_url)`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::resume::GeneratedResume;

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn find(
        &self,
        identity: &str,
        profile_url: &str,
    ) -> Result<Option<GeneratedResume>, AppError>;

    /// Records a resolved document. Returns `false` if the pair already had a row.
    async fn insert(&self, resume: &GeneratedResume) -> Result<bool, AppError>;

    /// All documents for an identity, newest first.
    async fn list_for_identity(&self, identity: &str) -> Result<Vec<GeneratedResume>, AppError>;
}

#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn find(
        &self,
        identity: &str,
        profile_url: &str,
    ) -> Result<Option<GeneratedResume>, AppError> {
        Ok(sqlx::query_as::<_, GeneratedResume>(
            "SELECT * FROM generated_resumes WHERE identity = $1 AND profile_url = $2",
        )
        .bind(identity)
        .bind(profile_url)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert(&self, resume: &GeneratedResume) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO generated_resumes (id, identity, profile_url, document, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (identity, profile_url) DO NOTHING
            "#,
        )
        .bind(resume.id)
        .bind(&resume.identity)
        .bind(&resume.profile_url)
        .bind(&resume.document)
        .bind(resume.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_identity(&self, identity: &str) -> Result<Vec<GeneratedResume>, AppError> {
        Ok(sqlx::query_as::<_, GeneratedResume>(
            "SELECT * FROM generated_resumes WHERE identity = $1 ORDER BY created_at DESC, id",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?)
    }
}
