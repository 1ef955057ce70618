use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::profile_client::{ProfileError, ProfileFetcher};

/// Serves a fixed profile document from disk instead of calling Bright Data.
/// The document's `links.linkedin` is rewritten to the requested URL.
pub struct FixtureProfileFetcher {
    path: PathBuf,
}

impl FixtureProfileFetcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ProfileFetcher for FixtureProfileFetcher {
    async fn fetch(&self, profile_url: &str) -> Result<Value, ProfileError> {
        info!("Serving profile from fixture {}", self.path.display());
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut document: Value = serde_json::from_str(&raw)?;

        if let Some(links) = document.get_mut("links").and_then(Value::as_object_mut) {
            links.insert(
                "linkedin".to_string(),
                Value::String(profile_url.to_string()),
            );
        }
        Ok(document)
    }
}
