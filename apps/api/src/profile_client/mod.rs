/// Profile extraction client — the single point of entry for fetching profile
/// documents from the outside world.
///
/// Production uses Bright Data's dataset API (trigger → poll progress → fetch
/// snapshot). A local fixture file can stand in for it during development.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod fixture;

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(30);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Trigger response carried no snapshot_id")]
    MissingSnapshotId,

    #[error("Collection job {0} failed")]
    JobFailed(String),

    #[error("Collection did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Snapshot contained no profile")]
    EmptySnapshot,

    #[error("Provider reported an error: {0}")]
    Provider(String),

    #[error("Fixture error: {0}")]
    Fixture(#[from] std::io::Error),
}

/// The outbound profile extraction seam. Carried in `AppState` as `Arc<dyn ProfileFetcher>`.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch(&self, profile_url: &str) -> Result<Value, ProfileError>;
}

/// Progress states reported by the collection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Failed,
    Pending,
}

/// Bright Data dataset client.
#[derive(Clone)]
pub struct BrightDataClient {
    client: Client,
    base_url: String,
    api_key: String,
    dataset_id: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl BrightDataClient {
    pub fn new(
        base_url: String,
        api_key: String,
        dataset_id: String,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            dataset_id,
            poll_interval,
            max_wait,
        })
    }

    async fn trigger(&self, profile_url: &str) -> Result<String, ProfileError> {
        let response = self
            .client
            .post(format!("{}/trigger", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[
                ("dataset_id", self.dataset_id.as_str()),
                ("include_errors", "true"),
            ])
            .json(&[serde_json::json!({ "url": profile_url })])
            .timeout(TRIGGER_TIMEOUT)
            .send()
            .await?;

        let body = read_json(response).await?;
        extract_snapshot_id(&body).ok_or(ProfileError::MissingSnapshotId)
    }

    async fn wait_until_ready(&self, snapshot_id: &str) -> Result<(), ProfileError> {
        loop {
            let response = self
                .client
                .get(format!("{}/progress/{snapshot_id}", self.base_url))
                .bearer_auth(&self.api_key)
                .timeout(PROGRESS_TIMEOUT)
                .send()
                .await?;

            match job_status(&read_json(response).await?) {
                JobStatus::Ready => return Ok(()),
                JobStatus::Failed => return Err(ProfileError::JobFailed(snapshot_id.to_string())),
                JobStatus::Pending => {
                    debug!("Snapshot {snapshot_id} not ready, polling again");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn fetch_snapshot(&self, snapshot_id: &str) -> Result<Value, ProfileError> {
        let response = self
            .client
            .get(format!("{}/snapshot/{snapshot_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("format", "json")])
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await?;

        first_profile(read_json(response).await?)
    }

    async fn collect(&self, profile_url: &str) -> Result<Value, ProfileError> {
        let snapshot_id = self.trigger(profile_url).await?;
        info!("Triggered profile collection, snapshot {snapshot_id}");
        self.wait_until_ready(&snapshot_id).await?;
        self.fetch_snapshot(&snapshot_id).await
    }
}

#[async_trait]
impl ProfileFetcher for BrightDataClient {
    async fn fetch(&self, profile_url: &str) -> Result<Value, ProfileError> {
        match tokio::time::timeout(self.max_wait, self.collect(profile_url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Profile collection exceeded {:?}", self.max_wait);
                Err(ProfileError::Timeout(self.max_wait))
            }
        }
    }
}

async fn read_json(response: Response) -> Result<Value, ProfileError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProfileError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// The trigger endpoint answers with either an object or a one-element list.
fn extract_snapshot_id(body: &Value) -> Option<String> {
    let holder = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    holder
        .get("snapshot_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn job_status(body: &Value) -> JobStatus {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if status.eq_ignore_ascii_case("ready") {
        JobStatus::Ready
    } else if status.eq_ignore_ascii_case("failed") {
        JobStatus::Failed
    } else {
        JobStatus::Pending
    }
}

fn first_profile(body: Value) -> Result<Value, ProfileError> {
    let profile = match body {
        Value::Array(items) => items.into_iter().next().ok_or(ProfileError::EmptySnapshot)?,
        Value::Object(map) => Value::Object(map),
        _ => return Err(ProfileError::EmptySnapshot),
    };
    if let Some(error) = profile.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProfileError::Provider(message));
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Local stand-in for the dataset API: reports "running" for the first
    /// `pending_polls` progress checks, then `final_status`.
    struct FakeDataset {
        pending_polls: usize,
        final_status: &'static str,
        polls: AtomicUsize,
    }

    async fn trigger(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer test-key") => Ok(Json(json!([{"snapshot_id": "s_test"}]))),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    async fn progress(
        State(dataset): State<Arc<FakeDataset>>,
        Path(id): Path<String>,
    ) -> Json<Value> {
        let seen = dataset.polls.fetch_add(1, Ordering::SeqCst);
        let status = if seen < dataset.pending_polls {
            "running"
        } else {
            dataset.final_status
        };
        Json(json!({"snapshot_id": id, "status": status}))
    }

    async fn snapshot(Path(id): Path<String>) -> Json<Value> {
        Json(json!([{"name": "Ada", "snapshot_id": id}]))
    }

    async fn serve_dataset(
        pending_polls: usize,
        final_status: &'static str,
    ) -> (String, Arc<FakeDataset>) {
        let dataset = Arc::new(FakeDataset {
            pending_polls,
            final_status,
            polls: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/trigger", post(trigger))
            .route("/progress/:id", get(progress))
            .route("/snapshot/:id", get(snapshot))
            .with_state(dataset.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), dataset)
    }

    fn client(base_url: String, max_wait: Duration) -> BrightDataClient {
        BrightDataClient::new(
            base_url,
            "test-key".to_string(),
            "gd_test".to_string(),
            Duration::from_millis(10),
            max_wait,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_polls_until_ready_then_reads_snapshot() {
        let (base_url, dataset) = serve_dataset(2, "ready").await;
        let profile = client(base_url, Duration::from_secs(5))
            .fetch("https://linkedin.com/in/ada")
            .await
            .unwrap();

        assert_eq!(profile["name"], "Ada");
        assert_eq!(profile["snapshot_id"], "s_test");
        assert_eq!(dataset.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_reports_failed_job() {
        let (base_url, _dataset) = serve_dataset(1, "failed").await;
        let err = client(base_url, Duration::from_secs(5))
            .fetch("https://linkedin.com/in/ada")
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::JobFailed(id) if id == "s_test"));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_wait() {
        let (base_url, dataset) = serve_dataset(usize::MAX, "running").await;
        let max_wait = Duration::from_millis(200);
        let err = client(base_url, max_wait)
            .fetch("https://linkedin.com/in/ada")
            .await
            .unwrap_err();

        assert!(matches!(err, ProfileError::Timeout(d) if d == max_wait));
        assert!(dataset.polls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_fetch_surfaces_api_errors() {
        let (base_url, _dataset) = serve_dataset(0, "ready").await;
        let err = BrightDataClient::new(
            base_url,
            "wrong-key".to_string(),
            "gd_test".to_string(),
            Duration::from_millis(10),
            Duration::from_secs(5),
        )
        .unwrap()
        .fetch("https://linkedin.com/in/ada")
        .await
        .unwrap_err();
        assert!(matches!(err, ProfileError::Api { status: 401, .. }));
    }

    #[test]
    fn test_snapshot_id_from_object() {
        assert_eq!(
            extract_snapshot_id(&json!({"snapshot_id": "s_1"})),
            Some("s_1".to_string())
        );
    }

    #[test]
    fn test_snapshot_id_from_list() {
        assert_eq!(
            extract_snapshot_id(&json!([{"snapshot_id": "s_2"}])),
            Some("s_2".to_string())
        );
        assert_eq!(extract_snapshot_id(&json!([])), None);
    }

    #[test]
    fn test_job_status_is_case_insensitive() {
        assert_eq!(job_status(&json!({"status": "READY"})), JobStatus::Ready);
        assert_eq!(job_status(&json!({"status": "failed"})), JobStatus::Failed);
        assert_eq!(job_status(&json!({"status": "running"})), JobStatus::Pending);
        assert_eq!(job_status(&json!({})), JobStatus::Pending);
    }

    #[test]
    fn test_first_profile_takes_first_item() {
        let profile = first_profile(json!([{"name": "Ada"}, {"name": "Bob"}])).unwrap();
        assert_eq!(profile["name"], "Ada");
    }

    #[test]
    fn test_first_profile_rejects_empty_and_errors() {
        assert!(matches!(
            first_profile(json!([])),
            Err(ProfileError::EmptySnapshot)
        ));
        assert!(matches!(
            first_profile(json!([{"error": "dead page"}])),
            Err(ProfileError::Provider(msg)) if msg == "dead page"
        ));
    }
}
