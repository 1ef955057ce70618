mod config;
mod db;
mod entitlements;
mod errors;
mod models;
mod payments;
mod profile_client;
mod resumes;
mod routes;
mod state;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::entitlements::store::PgEntitlementStore;
use crate::profile_client::fixture::FixtureProfileFetcher;
use crate::profile_client::{BrightDataClient, ProfileFetcher};
use crate::resumes::cache::RedisResumeCache;
use crate::resumes::resolver::ResumeResolver;
use crate::resumes::store::{PgResumeStore, ResumeStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LinkCV API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize Redis (ephemeral resume cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let fetcher = build_profile_fetcher(&config)?;

    let resumes: Arc<dyn ResumeStore> = Arc::new(PgResumeStore::new(db.clone()));
    let resolver = ResumeResolver::new(
        Arc::new(RedisResumeCache::new(redis, config.resume_cache_ttl)),
        resumes.clone(),
        fetcher,
    );

    // Build app state
    let state = AppState {
        entitlements: Arc::new(PgEntitlementStore::new(db)),
        resumes,
        resolver,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Uses the profile fixture when one is configured and present, Bright Data otherwise.
fn build_profile_fetcher(config: &Config) -> Result<Arc<dyn ProfileFetcher>> {
    if let Some(path) = config.active_fixture() {
        warn!(
            "Profile fixture {} is active; Bright Data will not be called",
            path.display()
        );
        return Ok(Arc::new(FixtureProfileFetcher::new(path.clone())));
    }

    let api_key = config
        .brightdata_api_key
        .clone()
        .context("BRIGHTDATA_API_KEY is required when no profile fixture is configured")?;
    let dataset_id = config
        .brightdata_dataset_id
        .clone()
        .context("BRIGHTDATA_DATASET_ID is required when no profile fixture is configured")?;

    let client = BrightDataClient::new(
        config.brightdata_base.clone(),
        api_key,
        dataset_id,
        config.profile_poll_interval,
        config.profile_fetch_timeout,
    )?;
    info!(
        "Profile client initialized ({}, timeout {:?})",
        config.brightdata_base, config.profile_fetch_timeout
    );
    Ok(Arc::new(client))
}
