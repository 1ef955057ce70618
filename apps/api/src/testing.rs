//! In-memory collaborators for unit tests.
//!
//! The entitlement store mirrors the Postgres constraints: `transaction_id` and
//! `token` are unique, and `debit` is a compare-and-increment under one lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{Config, EntitlementPolicy};
use crate::entitlements::store::{EntitlementStore, InsertOutcome};
use crate::errors::AppError;
use crate::models::entitlement::{Entitlement, NewEntitlement};
use crate::models::resume::GeneratedResume;
use crate::profile_client::{ProfileError, ProfileFetcher};
use crate::resumes::cache::ResumeCache;
use crate::resumes::resolver::ResumeResolver;
use crate::resumes::store::ResumeStore;
use crate::state::AppState;

pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// An unused entitlement created at `created_at` with the default 3-day / 2-use policy.
pub fn entitlement_fixture(identity: &str, token: &str, created_at: DateTime<Utc>) -> Entitlement {
    let policy = EntitlementPolicy::default();
    Entitlement {
        id: Uuid::new_v4(),
        identity: identity.to_string(),
        transaction_id: format!("tx-{}", Uuid::new_v4()),
        token: token.to_string(),
        amount_paid: 990,
        status: "PAID".to_string(),
        created_at,
        expires_at: created_at + policy.ttl,
        usage_count: 0,
        max_usage: policy.max_usage,
    }
}

#[derive(Default)]
pub struct InMemoryEntitlementStore {
    rows: Mutex<Vec<Entitlement>>,
    reads: AtomicUsize,
}

impl InMemoryEntitlementStore {
    pub fn seed(&self, entitlement: Entitlement) {
        self.rows.lock().unwrap().push(entitlement);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Number of lookups served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn insert_if_absent(&self, new: &NewEntitlement) -> Result<InsertOutcome, AppError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.transaction_id == new.transaction_id) {
            return Ok(InsertOutcome::DuplicateTransaction);
        }
        if rows.iter().any(|r| r.token == new.token) {
            return Ok(InsertOutcome::TokenCollision);
        }
        let row = Entitlement {
            id: new.id,
            identity: new.identity.clone(),
            transaction_id: new.transaction_id.clone(),
            token: new.token.clone(),
            amount_paid: new.amount_paid,
            status: new.status.clone(),
            created_at: new.created_at,
            expires_at: new.expires_at,
            usage_count: 0,
            max_usage: new.max_usage,
        };
        rows.push(row.clone());
        Ok(InsertOutcome::Inserted(row))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.transaction_id == transaction_id)
            .cloned())
    }

    async fn find_by_token(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.identity == identity && r.token == token)
            .cloned())
    }

    async fn debit(
        &self,
        identity: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| {
            r.identity == identity
                && r.token == token
                && r.usage_count < r.max_usage
                && r.expires_at >= now
        }) else {
            return Ok(None);
        };
        row.usage_count += 1;
        Ok(Some(row.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryResumeStore {
    rows: Mutex<Vec<GeneratedResume>>,
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn find(
        &self,
        identity: &str,
        profile_url: &str,
    ) -> Result<Option<GeneratedResume>, AppError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.identity == identity && r.profile_url == profile_url)
            .cloned())
    }

    async fn insert(&self, resume: &GeneratedResume) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.identity == resume.identity && r.profile_url == resume.profile_url)
        {
            return Ok(false);
        }
        rows.push(resume.clone());
        Ok(true)
    }

    async fn list_for_identity(&self, identity: &str) -> Result<Vec<GeneratedResume>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<_> = rows
            .iter()
            .filter(|r| r.identity == identity)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

/// Stores serialized JSON, like Redis does.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    broken: AtomicBool,
}

impl MemoryCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Makes every get/put fail, as an unreachable Redis would.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResumeCache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("cache unreachable");
        }
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .map(|raw| serde_json::from_str(raw))
            .transpose()?)
    }

    async fn put(&self, key: &str, document: &Value) -> anyhow::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("cache unreachable");
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), serde_json::to_string(document)?);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum FetchBehavior {
    Document(Value),
    Fail,
    Timeout,
}

pub struct StubFetcher {
    behavior: FetchBehavior,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileFetcher for StubFetcher {
    async fn fetch(&self, _profile_url: &str) -> Result<Value, ProfileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FetchBehavior::Document(doc) => Ok(doc.clone()),
            FetchBehavior::Fail => Err(ProfileError::JobFailed("stub".to_string())),
            FetchBehavior::Timeout => Err(ProfileError::Timeout(Duration::from_secs(1))),
        }
    }
}

impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://unused".to_string(),
            redis_url: "redis://unused".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            brightdata_base: "http://unused".to_string(),
            brightdata_api_key: None,
            brightdata_dataset_id: None,
            profile_fixture_path: None,
            profile_fetch_timeout: Duration::from_secs(1),
            profile_poll_interval: Duration::from_millis(10),
            resume_cache_ttl: None,
            entitlement_policy: EntitlementPolicy::default(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

/// Full application state wired to in-memory collaborators.
pub fn test_state(behavior: FetchBehavior) -> AppState {
    let resumes: Arc<dyn ResumeStore> = Arc::new(InMemoryResumeStore::default());
    AppState {
        entitlements: Arc::new(InMemoryEntitlementStore::default()),
        resumes: resumes.clone(),
        resolver: ResumeResolver::new(
            Arc::new(MemoryCache::default()),
            resumes,
            Arc::new(StubFetcher::new(behavior)),
        ),
        config: Config::for_tests(),
    }
}
