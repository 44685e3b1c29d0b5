//! Typed async client over the shared key-value store.
//!
//! The store is the cross-process coordination point: the crawl frontier,
//! visited set and depth map live here (so a restarted worker can resume),
//! as do proxy failure counters, sticky assignments and both caches.

use anyhow::{Context, Result};
use redis::AsyncCommands;

/// Thin wrapper over a multiplexed connection. Cheap to clone; every
/// clone shares the underlying connection.
#[derive(Clone)]
pub struct SharedStore {
    conn: redis::aio::MultiplexedConnection,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore").finish_non_exhaustive()
    }
}

impl SharedStore {
    /// Open a dedicated connection. Crawls call this once at init so a
    /// store hiccup in one crawl cannot poison another's pipeline.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to shared store")?;
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1).await?)
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs).await?;
        Ok(())
    }

    pub async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    // --- sorted set (frontier) ---

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score).await?;
        Ok(())
    }

    /// Pop the highest-scored member, or `None` when the set is empty.
    pub async fn zpopmax(&self, key: &str) -> Result<Option<(String, f64)>> {
        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn.zpopmax(key, 1).await?;
        Ok(popped.into_iter().next())
    }

    pub async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    // --- set (visited) ---

    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(key, member).await?)
    }

    pub async fn scard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    // --- hash (depth map, job fields) ---

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    pub async fn hgetall(&self, key: &str) -> Result<std::collections::HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }
}
