//! URL admissibility for the crawl frontier.

use globset::{Glob, GlobSet, GlobSetBuilder};
use url::Url;

use crate::schema::CrawlRequest;

/// Extensions that never serve HTML worth extracting.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".mp4", ".mp3", ".zip", ".tar",
    ".gz", ".css", ".js",
];

/// First path segments that mark utility/chrome pages — never content.
const JUNK_PATH_SEGMENTS: &[&str] = &[
    "signin", "sign-in", "sign_in", "login", "log-in", "log_in",
    "signup", "sign-up", "sign_up", "register", "registration",
    "cart", "checkout", "basket", "bag", "payment", "order",
    "account", "my-account", "myaccount", "profile", "settings",
    "wishlist", "wish-list", "favorites", "favourites", "saved",
    "help", "contact", "contact-us", "support", "faq", "faqs",
    "privacy", "privacy-policy", "terms", "terms-of-service",
    "terms-of-use", "legal", "disclaimer", "cookie-policy",
    "language", "locale", "region", "country-selector",
    "subscribe", "unsubscribe", "newsletter",
    "compare", "comparison",
    "returns", "return-policy", "refund", "shipping",
    "sitemap", "sitemap.xml",
    "feed", "rss", "atom",
    "print", "share", "email-friend",
    "404", "error", "not-found",
];

/// Compiled admissibility filter for one crawl. Globs are compiled once
/// at engine init, not per candidate URL.
pub struct UrlFilter {
    base_host: String,
    max_depth: u32,
    allow_external: bool,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

fn compile_globs(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added += 1;
            }
            Err(e) => tracing::warn!(pattern, error = %e, "skipping invalid path glob"),
        }
    }
    if added == 0 {
        return None;
    }
    builder.build().ok()
}

impl UrlFilter {
    /// Build the filter from the crawl config. Fails only on an
    /// unparseable seed URL.
    pub fn new(config: &CrawlRequest) -> Result<Self, crate::error::CrawlError> {
        let seed = Url::parse(&config.url).map_err(|e| {
            crate::error::CrawlError::ConfigError(format!("bad seed url {}: {e}", config.url))
        })?;
        Ok(Self {
            base_host: seed.host_str().unwrap_or_default().to_string(),
            max_depth: config.max_depth,
            allow_external: config.allow_external_links,
            include: compile_globs(&config.include_paths),
            exclude: compile_globs(&config.exclude_paths),
        })
    }

    /// Full admissibility check for a candidate at the given depth.
    #[must_use]
    pub fn should_crawl(&self, url: &str, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if !self.allow_external && parsed.host_str().unwrap_or_default() != self.base_host {
            return false;
        }

        let path = parsed.path();
        let path_lower = path.to_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path_lower.ends_with(ext)) {
            return false;
        }

        if let Some(first_segment) = path_lower
            .trim_matches('/')
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
        {
            if JUNK_PATH_SEGMENTS.contains(&first_segment) {
                return false;
            }
        }

        if let Some(include) = &self.include {
            if !include.is_match(path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> CrawlRequest {
        serde_json::from_value(serde_json::json!({ "url": url, "max_depth": 3 }))
            .expect("valid config")
    }

    #[test]
    fn depth_and_domain_bounds() {
        let filter = UrlFilter::new(&config("https://example.com/")).expect("valid");
        assert!(filter.should_crawl("https://example.com/a", 3));
        assert!(!filter.should_crawl("https://example.com/a", 4));
        assert!(!filter.should_crawl("https://other.org/a", 1));
    }

    #[test]
    fn external_links_toggle() {
        let mut cfg = config("https://example.com/");
        cfg.allow_external_links = true;
        let filter = UrlFilter::new(&cfg).expect("valid");
        assert!(filter.should_crawl("https://other.org/a", 1));
    }

    #[test]
    fn non_html_extensions_rejected() {
        let filter = UrlFilter::new(&config("https://example.com/")).expect("valid");
        assert!(!filter.should_crawl("https://example.com/report.pdf", 1));
        assert!(!filter.should_crawl("https://example.com/app.JS", 1));
        assert!(filter.should_crawl("https://example.com/report", 1));
    }

    #[test]
    fn junk_first_segment_rejected() {
        let filter = UrlFilter::new(&config("https://example.com/")).expect("valid");
        assert!(!filter.should_crawl("https://example.com/login", 1));
        assert!(!filter.should_crawl("https://example.com/cart/items", 1));
        // Junk words deeper in the path are fine
        assert!(filter.should_crawl("https://example.com/docs/login-flows", 1));
    }

    #[test]
    fn include_exclude_globs() {
        let mut cfg = config("https://example.com/");
        cfg.include_paths = vec!["/docs/**".to_string()];
        cfg.exclude_paths = vec!["/docs/v1/**".to_string()];
        let filter = UrlFilter::new(&cfg).expect("valid");
        assert!(filter.should_crawl("https://example.com/docs/intro", 1));
        assert!(!filter.should_crawl("https://example.com/blog/post", 1));
        assert!(!filter.should_crawl("https://example.com/docs/v1/old", 1));
    }
}
