use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_BRIGHTDATA_BASE: &str = "https://api.brightdata.com/datasets/v3";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub webhook_secret: String,
    pub brightdata_base: String,
    pub brightdata_api_key: Option<String>,
    pub brightdata_dataset_id: Option<String>,
    /// When set and present on disk, profiles are read from this file instead of Bright Data.
    pub profile_fixture_path: Option<PathBuf>,
    pub profile_fetch_timeout: Duration,
    pub profile_poll_interval: Duration,
    /// `None` leaves cached documents without expiry.
    pub resume_cache_ttl: Option<Duration>,
    pub entitlement_policy: EntitlementPolicy,
    pub port: u16,
    pub rust_log: String,
}

/// Defaults applied to every entitlement created by payment intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    pub ttl: chrono::Duration,
    pub max_usage: i32,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::days(3),
            max_usage: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let ttl_hours: i64 = parse_env_or("ENTITLEMENT_TTL_HOURS", 72)?;
        let max_usage: i32 = parse_env_or("ENTITLEMENT_MAX_USAGE", 2)?;
        if max_usage < 1 {
            anyhow::bail!("ENTITLEMENT_MAX_USAGE must be at least 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            webhook_secret: require_env("WEBHOOK_SECRET")?,
            brightdata_base: std::env::var("BRIGHTDATA_BASE")
                .unwrap_or_else(|_| DEFAULT_BRIGHTDATA_BASE.to_string()),
            brightdata_api_key: optional_env("BRIGHTDATA_API_KEY"),
            brightdata_dataset_id: optional_env("BRIGHTDATA_DATASET_ID"),
            profile_fixture_path: optional_env("PROFILE_FIXTURE_PATH").map(PathBuf::from),
            profile_fetch_timeout: Duration::from_secs(parse_env_or(
                "PROFILE_FETCH_TIMEOUT_SECS",
                180,
            )?),
            profile_poll_interval: Duration::from_secs(parse_env_or(
                "PROFILE_POLL_INTERVAL_SECS",
                3,
            )?),
            resume_cache_ttl: optional_env("RESUME_CACHE_TTL_SECS")
                .map(|v| {
                    v.parse::<u64>()
                        .context("RESUME_CACHE_TTL_SECS must be a number of seconds")
                })
                .transpose()?
                .map(Duration::from_secs),
            entitlement_policy: EntitlementPolicy {
                ttl: chrono::Duration::hours(ttl_hours),
                max_usage,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Returns the fixture path only if the file actually exists.
    pub fn active_fixture(&self) -> Option<&PathBuf> {
        self.profile_fixture_path.as_ref().filter(|p| p.exists())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        None => Ok(default),
    }
}
