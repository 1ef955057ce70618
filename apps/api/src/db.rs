use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entitlements (
        id              UUID PRIMARY KEY,
        identity        TEXT NOT NULL,
        transaction_id  TEXT NOT NULL,
        token           TEXT NOT NULL,
        amount_paid     BIGINT NOT NULL DEFAULT 0,
        status          TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL,
        expires_at      TIMESTAMPTZ NOT NULL,
        usage_count     INTEGER NOT NULL DEFAULT 0,
        max_usage       INTEGER NOT NULL DEFAULT 2,
        CONSTRAINT entitlements_transaction_id_key UNIQUE (transaction_id),
        CONSTRAINT entitlements_token_key UNIQUE (token),
        CONSTRAINT entitlements_usage_within_quota CHECK (usage_count <= max_usage)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS entitlements_identity_token_idx ON entitlements (identity, token)",
    r#"
    CREATE TABLE IF NOT EXISTS generated_resumes (
        id           UUID PRIMARY KEY,
        identity     TEXT NOT NULL,
        profile_url  TEXT NOT NULL,
        document     JSONB NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        CONSTRAINT generated_resumes_identity_url_key UNIQUE (identity, profile_url)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS generated_resumes_identity_created_idx ON generated_resumes (identity, created_at DESC)",
];

/// Creates the two tables the service owns if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
