//! Resume Cache Resolver — three tiers, checked in order:
//!
//! 1. ephemeral cache (Redis) by `cache_key(identity, url)`; returned as-is
//! 2. durable store by exact `(identity, url)`; the ephemeral tier is NOT backfilled
//! 3. fresh fetch from the profile provider, written through to both tiers
//!
//! Must only be called after the caller's token has been debited. Nothing here
//! takes a database lock across the provider call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::GeneratedResume;
use crate::profile_client::ProfileFetcher;
use crate::resumes::cache::{cache_key, ResumeCache};
use crate::resumes::store::ResumeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    Store,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub document: Value,
    pub source: ResolutionSource,
}

#[derive(Clone)]
pub struct ResumeResolver {
    cache: Arc<dyn ResumeCache>,
    store: Arc<dyn ResumeStore>,
    fetcher: Arc<dyn ProfileFetcher>,
}

impl ResumeResolver {
    pub fn new(
        cache: Arc<dyn ResumeCache>,
        store: Arc<dyn ResumeStore>,
        fetcher: Arc<dyn ProfileFetcher>,
    ) -> Self {
        Self {
            cache,
            store,
            fetcher,
        }
    }

    pub async fn resolve(
        &self,
        identity: &str,
        profile_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolved, AppError> {
        let key = cache_key(identity, profile_url);

        match self.cache.get(&key).await {
            Ok(Some(document)) => {
                info!("Resume for identity {identity} served from cache ({key})");
                return Ok(Resolved {
                    document,
                    source: ResolutionSource::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for {key}, falling through: {e}"),
        }

        if let Some(existing) = self.store.find(identity, profile_url).await? {
            info!("Resume for identity {identity} served from store");
            return Ok(Resolved {
                document: existing.document,
                source: ResolutionSource::Store,
            });
        }

        info!("Fetching fresh profile for identity {identity}");
        let document = self.fetcher.fetch(profile_url).await?;

        if let Err(e) = self.cache.put(&key, &document).await {
            warn!("Cache write failed for {key}: {e}");
        }

        let record = GeneratedResume {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            profile_url: profile_url.to_string(),
            document: document.clone(),
            created_at: now,
        };
        match self.store.insert(&record).await {
            Ok(true) => {}
            Ok(false) => info!("Resume for identity {identity} was stored concurrently"),
            // The caller has already paid for this document; hand it over anyway.
            Err(e) => error!("Failed to persist resume for identity {identity}: {e}"),
        }

        Ok(Resolved {
            document,
            source: ResolutionSource::Fresh,
        })
    }
}
