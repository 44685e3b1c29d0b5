//! Two caches on the shared store: URL-keyed scrape content and job-keyed
//! response bodies.

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::schema::ScrapeArtifact;
use crate::store::SharedStore;

/// Scrape content cache TTL.
const SCRAPE_TTL_SECS: u64 = 300;
/// Job response cache TTL.
const JOB_TTL_SECS: u64 = 3600;

/// Cache key for a scrape: hash of URL plus the sorted format list, so
/// the same URL requested with different formats caches separately.
#[must_use]
pub fn scrape_cache_key(url: &str, formats: &[String]) -> String {
    let mut sorted: Vec<&str> = formats.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let material = format!("{url}|{}", sorted.join(","));
    format!("scrape:cache:{:016x}", xxh3_64(material.as_bytes()))
}

/// Cached artifact lookup; `None` on miss or deserialization drift.
pub async fn get_cached_scrape(
    store: &SharedStore,
    url: &str,
    formats: &[String],
) -> Option<ScrapeArtifact> {
    let key = scrape_cache_key(url, formats);
    match store.get(&key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
        _ => None,
    }
}

/// Populate the content cache. Only called on genuine success — fallback
/// partials are never cached.
pub async fn set_cached_scrape(
    store: &SharedStore,
    url: &str,
    formats: &[String],
    artifact: &ScrapeArtifact,
) {
    let key = scrape_cache_key(url, formats);
    match serde_json::to_string(artifact) {
        Ok(raw) => {
            if let Err(e) = store.set_ex(&key, &raw, SCRAPE_TTL_SECS).await {
                debug!(error = %e, "failed to cache scrape artifact");
            }
        }
        Err(e) => debug!(error = %e, "failed to serialize scrape artifact for cache"),
    }
}

fn job_cache_key(job_id: &str, page: Option<u32>) -> String {
    match page {
        Some(p) => format!("job:response:{job_id}:page:{p}"),
        None => format!("job:response:{job_id}"),
    }
}

/// Cached serialized response body for a completed/failed job.
pub async fn get_cached_job_response(
    store: &SharedStore,
    job_id: &str,
    page: Option<u32>,
) -> Option<String> {
    store.get(&job_cache_key(job_id, page)).await.ok().flatten()
}

/// Populate the job-response cache when a job completes or fails.
pub async fn set_cached_job_response(
    store: &SharedStore,
    job_id: &str,
    page: Option<u32>,
    body: &str,
) {
    if let Err(e) = store
        .set_ex(&job_cache_key(job_id, page), body, JOB_TTL_SECS)
        .await
    {
        debug!(error = %e, "failed to cache job response");
    }
}

/// Invalidate every cached page of a job's response (called on cancel).
pub async fn invalidate_job_response(store: &SharedStore, job_id: &str, max_pages: u32) {
    let mut keys = vec![job_cache_key(job_id, None)];
    keys.extend((0..=max_pages).map(|p| job_cache_key(job_id, Some(p))));
    if let Err(e) = store.delete(&keys).await {
        debug!(error = %e, "failed to invalidate job response cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_format_order_insensitive() {
        let a = scrape_cache_key(
            "https://example.com",
            &["markdown".to_string(), "links".to_string()],
        );
        let b = scrape_cache_key(
            "https://example.com",
            &["links".to_string(), "markdown".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_by_format_set() {
        let a = scrape_cache_key("https://example.com", &["markdown".to_string()]);
        let b = scrape_cache_key("https://example.com", &["html".to_string()]);
        assert_ne!(a, b);
    }
}
