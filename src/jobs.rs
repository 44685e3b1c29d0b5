//! Job persistence interface and webhook delivery.
//!
//! Job storage is an external collaborator — the crawl engine only needs
//! the small surface below. A Redis-backed implementation ships for
//! production wiring and an in-memory one for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::SharedStore;

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One persisted page result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persistence surface the crawl engine depends on.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_status(&self, job_id: &str) -> anyhow::Result<Option<JobStatus>>;
    async fn set_status(&self, job_id: &str, status: JobStatus) -> anyhow::Result<()>;
    async fn set_error(&self, job_id: &str, error: &str) -> anyhow::Result<()>;
    async fn set_total_pages(&self, job_id: &str, total: usize) -> anyhow::Result<()>;
    async fn set_completed_pages(&self, job_id: &str, completed: usize) -> anyhow::Result<()>;
    async fn mark_started(&self, job_id: &str) -> anyhow::Result<()>;
    async fn mark_completed_at(&self, job_id: &str) -> anyhow::Result<()>;
    async fn add_result(&self, job_id: &str, result: JobResult) -> anyhow::Result<()>;
}

/// Redis-backed job store: job fields in a hash, results in a list key.
pub struct RedisJobStore {
    store: SharedStore,
}

impl RedisJobStore {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn job_key(job_id: &str) -> String {
        format!("job:{job_id}")
    }

    fn results_key(job_id: &str) -> String {
        format!("job:{job_id}:results")
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get_status(&self, job_id: &str) -> anyhow::Result<Option<JobStatus>> {
        let raw = self.store.hget(&Self::job_key(job_id), "status").await?;
        Ok(raw.as_deref().and_then(JobStatus::parse))
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> anyhow::Result<()> {
        self.store
            .hset(&Self::job_key(job_id), "status", status.as_str())
            .await
    }

    async fn set_error(&self, job_id: &str, error: &str) -> anyhow::Result<()> {
        self.store.hset(&Self::job_key(job_id), "error", error).await
    }

    async fn set_total_pages(&self, job_id: &str, total: usize) -> anyhow::Result<()> {
        self.store
            .hset(&Self::job_key(job_id), "total_pages", &total.to_string())
            .await
    }

    async fn set_completed_pages(&self, job_id: &str, completed: usize) -> anyhow::Result<()> {
        self.store
            .hset(
                &Self::job_key(job_id),
                "completed_pages",
                &completed.to_string(),
            )
            .await
    }

    async fn mark_started(&self, job_id: &str) -> anyhow::Result<()> {
        self.store
            .hset(
                &Self::job_key(job_id),
                "started_at",
                &Utc::now().to_rfc3339(),
            )
            .await
    }

    async fn mark_completed_at(&self, job_id: &str) -> anyhow::Result<()> {
        self.store
            .hset(
                &Self::job_key(job_id),
                "completed_at",
                &Utc::now().to_rfc3339(),
            )
            .await
    }

    async fn add_result(&self, job_id: &str, result: JobResult) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&result)?;
        // Results list is append-only; a counter field doubles as the index.
        let idx = self
            .store
            .incr(&format!("{}:count", Self::results_key(job_id)))
            .await?;
        self.store
            .hset(&Self::results_key(job_id), &idx.to_string(), &serialized)
            .await
    }
}

/// In-memory job store for tests and embedded use.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: parking_lot::Mutex<MemoryJobs>,
}

#[derive(Default)]
struct MemoryJobs {
    status: HashMap<String, JobStatus>,
    errors: HashMap<String, String>,
    totals: HashMap<String, usize>,
    completed: HashMap<String, usize>,
    results: HashMap<String, Vec<JobResult>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn results(&self, job_id: &str) -> Vec<JobResult> {
        self.inner
            .lock()
            .results
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn completed_pages(&self, job_id: &str) -> usize {
        self.inner.lock().completed.get(job_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_status(&self, job_id: &str) -> anyhow::Result<Option<JobStatus>> {
        Ok(self.inner.lock().status.get(job_id).copied())
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> anyhow::Result<()> {
        self.inner.lock().status.insert(job_id.to_string(), status);
        Ok(())
    }

    async fn set_error(&self, job_id: &str, error: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .errors
            .insert(job_id.to_string(), error.to_string());
        Ok(())
    }

    async fn set_total_pages(&self, job_id: &str, total: usize) -> anyhow::Result<()> {
        self.inner.lock().totals.insert(job_id.to_string(), total);
        Ok(())
    }

    async fn set_completed_pages(&self, job_id: &str, completed: usize) -> anyhow::Result<()> {
        self.inner
            .lock()
            .completed
            .insert(job_id.to_string(), completed);
        Ok(())
    }

    async fn mark_started(&self, _job_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn mark_completed_at(&self, _job_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_result(&self, job_id: &str, result: JobResult) -> anyhow::Result<()> {
        self.inner
            .lock()
            .results
            .entry(job_id.to_string())
            .or_default()
            .push(result);
        Ok(())
    }
}

/// Job lifecycle webhook payload.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: &'a str,
    pub job_id: &'a str,
    pub job_type: &'a str,
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

/// Deliver a job lifecycle event. Best-effort: failures are logged, never
/// propagated.
pub async fn send_webhook(url: &str, payload: &WebhookPayload<'_>, secret: Option<&str>) {
    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "webhook client build failed");
            return;
        }
    };

    let mut request = client.post(url).json(payload);
    if let Some(secret) = secret {
        request = request.header("X-Webhook-Secret", secret);
    }

    match request.send().await {
        Ok(resp) => debug!(url, status = resp.status().as_u16(), "webhook delivered"),
        Err(e) => warn!(url, error = %e, "webhook delivery failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[tokio::test]
    async fn memory_store_tracks_results() {
        let store = MemoryJobStore::new();
        store
            .set_status("j1", JobStatus::Running)
            .await
            .expect("set status");
        store
            .add_result(
                "j1",
                JobResult {
                    url: "https://example.com".to_string(),
                    created_at: Utc::now(),
                    ..JobResult::default()
                },
            )
            .await
            .expect("add result");
        assert_eq!(store.results("j1").len(), 1);
        assert_eq!(store.get_status("j1").await.expect("get"), Some(JobStatus::Running));
    }
}
