//! Process-wide settings read from the environment.
//!
//! Read once at startup and passed down as an `Arc<Settings>`; nothing in
//! the pipelines consults the environment directly.

use std::sync::Arc;

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upper bound applied to every crawl's `max_pages`.
    pub max_crawl_pages: usize,
    /// Size of the global scrape concurrency semaphore.
    pub max_concurrent_scrapes: usize,
    /// Overall scrape API deadline, in seconds.
    pub scrape_api_timeout_secs: u64,
    /// Concurrent stealth Chromium contexts.
    pub chromium_pool_size: usize,
    /// Concurrent Firefox contexts (served through the sidecar).
    pub firefox_pool_size: usize,
    /// Run browsers headless.
    pub browser_headless: bool,
    /// Optional stealth-engine sidecar base URL. When set, browser tiers
    /// prefer the sidecar and the Firefox tier becomes available.
    pub stealth_engine_url: Option<String>,
    /// Comma-separated static builtin proxy URLs.
    pub builtin_proxy_url: Option<String>,
    /// Optional HTTP endpoint returning a JSON proxy list (cached 10 min).
    pub builtin_proxy_list_url: Option<String>,
    /// Shared state store connection URL.
    pub redis_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_crawl_pages: 500,
            max_concurrent_scrapes: 20,
            scrape_api_timeout_secs: 180,
            chromium_pool_size: 4,
            firefox_pool_size: 2,
            browser_headless: true,
            stealth_engine_url: None,
            builtin_proxy_url: None,
            builtin_proxy_list_url: None,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Arc<Self> {
        let defaults = Self::default();
        let settings = Self {
            max_crawl_pages: env_parse("MAX_CRAWL_PAGES", defaults.max_crawl_pages),
            max_concurrent_scrapes: env_parse(
                "MAX_CONCURRENT_SCRAPES",
                defaults.max_concurrent_scrapes,
            ),
            scrape_api_timeout_secs: env_parse(
                "SCRAPE_API_TIMEOUT",
                defaults.scrape_api_timeout_secs,
            ),
            chromium_pool_size: env_parse("CHROMIUM_POOL_SIZE", defaults.chromium_pool_size),
            firefox_pool_size: env_parse("FIREFOX_POOL_SIZE", defaults.firefox_pool_size),
            browser_headless: env_bool("BROWSER_HEADLESS", defaults.browser_headless),
            stealth_engine_url: env_opt("STEALTH_ENGINE_URL"),
            builtin_proxy_url: env_opt("BUILTIN_PROXY_URL"),
            builtin_proxy_list_url: env_opt("BUILTIN_PROXY_LIST_URL"),
            redis_url: env_opt("REDIS_URL").unwrap_or(defaults.redis_url),
        };
        tracing::debug!(?settings, "loaded settings from environment");
        Arc::new(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert!(s.max_crawl_pages > 0);
        assert!(s.browser_headless);
        assert!(s.stealth_engine_url.is_none());
    }
}
