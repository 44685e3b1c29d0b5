//! Per-host robots.txt cache.
//!
//! Fetched once per scheme+host through the TLS-impersonating client
//! (sites that block bots block their robots.txt fetches too). A fetch
//! or parse failure caches an allow-all entry.

use std::collections::HashMap;

use texting_robots::Robot;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Cached robots decisions for one crawl.
pub struct RobotsCache {
    parsers: Mutex<HashMap<String, Option<Robot>>>,
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotsCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a parsed robots.txt directly (tests, pre-fetched content).
    pub async fn insert(&self, origin: &str, robots_txt: &str) {
        let robot = Robot::new("*", robots_txt.as_bytes()).ok();
        self.parsers.lock().await.insert(origin.to_string(), robot);
    }

    async fn fetch_robots(origin: &str) -> Option<Robot> {
        let robots_url = format!("{origin}/robots.txt");
        let client = rquest::Client::builder()
            .emulation(crate::fetch::TlsProfile::Chrome124.emulation())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .ok()?;
        let response = client.get(&robots_url).send().await.ok()?;
        if response.status().as_u16() != 200 {
            return None;
        }
        let text = response.text().await.ok()?;
        Robot::new("*", text.as_bytes()).ok()
    }

    /// True when `url` is allowed for `*`. Unknown hosts trigger one
    /// fetch; failures allow everything.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let origin = format!("{}://{host}", parsed.scheme());

        let mut parsers = self.parsers.lock().await;
        if !parsers.contains_key(&origin) {
            let robot = Self::fetch_robots(&origin).await;
            if robot.is_none() {
                debug!(origin, "robots.txt unavailable, allowing all");
            }
            parsers.insert(origin.clone(), robot);
        }

        match parsers.get(&origin) {
            Some(Some(robot)) => robot.allowed(url),
            // Missing or unparseable robots.txt: allow-all.
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disallowed_path_blocked_when_respecting() {
        let cache = RobotsCache::new();
        cache
            .insert(
                "https://example.com",
                "User-agent: *\nDisallow: /private/\n",
            )
            .await;
        assert!(!cache.is_allowed("https://example.com/private/x").await);
        assert!(cache.is_allowed("https://example.com/public/x").await);
    }

    #[tokio::test]
    async fn unparseable_robots_allows_all() {
        let cache = RobotsCache::new();
        cache.insert("https://example.com", "").await;
        assert!(cache.is_allowed("https://example.com/anything").await);
    }
}
