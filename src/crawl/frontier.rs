//! Store-backed crawl frontier.
//!
//! The frontier is a sorted set in the shared store, with a companion
//! visited set and per-URL depth map. Living in the store (rather than in
//! process memory) means a restarted crawl worker resumes where it left
//! off, and parallel workers coordinate on the same keys.

use anyhow::Result;

use crate::store::SharedStore;

/// TTL on all three crawl keys.
const CRAWL_KEY_TTL_SECS: i64 = 86_400;

/// Handle over the three keys of one crawl.
pub struct Frontier {
    store: SharedStore,
    frontier_key: String,
    visited_key: String,
    depth_key: String,
}

impl Frontier {
    #[must_use]
    pub fn new(store: SharedStore, job_id: &str) -> Self {
        Self {
            store,
            frontier_key: format!("crawl:{job_id}:frontier"),
            visited_key: format!("crawl:{job_id}:visited"),
            depth_key: format!("crawl:{job_id}:depth"),
        }
    }

    /// Add a URL at a score and depth. The sorted set dedups members
    /// implicitly (re-adding updates the score).
    pub async fn add(&self, url: &str, score: f64, depth: u32) -> Result<()> {
        self.store.zadd(&self.frontier_key, url, score).await?;
        self.store
            .hset(&self.depth_key, url, &depth.to_string())
            .await?;
        Ok(())
    }

    /// Refresh the 24h TTL on all three keys.
    pub async fn touch_ttl(&self) -> Result<()> {
        for key in [&self.frontier_key, &self.visited_key, &self.depth_key] {
            self.store.expire(key, CRAWL_KEY_TTL_SECS).await?;
        }
        Ok(())
    }

    /// Pop the highest-priority URL with its stored depth.
    pub async fn pop_max(&self) -> Result<Option<(String, u32)>> {
        let Some((url, _score)) = self.store.zpopmax(&self.frontier_key).await? else {
            return Ok(None);
        };
        let depth = self
            .store
            .hget(&self.depth_key, &url)
            .await?
            .and_then(|d| d.parse().ok())
            .unwrap_or(0);
        Ok(Some((url, depth)))
    }

    pub async fn mark_visited(&self, url: &str) -> Result<()> {
        self.store.sadd(&self.visited_key, url).await
    }

    pub async fn is_visited(&self, url: &str) -> Result<bool> {
        self.store.sismember(&self.visited_key, url).await
    }

    pub async fn visited_count(&self) -> Result<u64> {
        self.store.scard(&self.visited_key).await
    }

    pub async fn size(&self) -> Result<u64> {
        self.store.zcard(&self.frontier_key).await
    }

    /// Delete all three keys (crawl completion/cleanup).
    pub async fn clear(&self) -> Result<()> {
        self.store
            .delete(&[
                self.frontier_key.clone(),
                self.visited_key.clone(),
                self.depth_key.clone(),
            ])
            .await
    }
}
