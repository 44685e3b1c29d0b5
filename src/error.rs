//! Error types shared across the scrape and crawl pipelines.
//!
//! Tier adapters never raise across the tier boundary — transport and
//! anti-bot failures degrade to null fetch results. These enums cover the
//! errors that *do* cross module boundaries: pool exhaustion, store
//! failures, and job-level crawl failures.

use std::fmt;

/// Error raised by the single-page scrape entry point.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The browser pool could not hand out a context within its wait budget.
    #[error("browser pool at capacity, try again later")]
    AtCapacity,
    /// The overall scrape deadline elapsed.
    #[error("scrape timed out after {0}ms")]
    Timeout(u64),
    /// The URL points at a non-HTML document (PDF, DOCX, ...); document
    /// extraction is handled by an external collaborator.
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),
    /// The request itself was malformed (bad URL, empty format list).
    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),
    /// Browser-side failure that survived the relaunch/retry path.
    #[error("browser error: {0}")]
    Browser(String),
}

impl ScrapeError {
    /// Stable machine-readable code surfaced to API callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AtCapacity => "CAPACITY",
            Self::Timeout(_) => "TIMEOUT",
            Self::UnsupportedDocument(_) => "UNSUPPORTED_DOCUMENT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Browser(_) => "BROWSER_ERROR",
        }
    }
}

/// Error raised by a crawl job. Store failures are fatal for the crawl;
/// everything else is recovered per-page.
#[derive(Debug, Clone)]
pub enum CrawlError {
    /// Configuration could not be validated (bad seed URL, bad globs).
    ConfigError(String),
    /// The shared state store failed mid-crawl.
    StoreError(String),
    /// Browser/session error that could not be recovered.
    BrowserError(String),
    /// Crawl was cancelled by an external actor.
    Cancelled,
    /// Other errors.
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::StoreError(msg) => write!(f, "State store error: {msg}"),
            Self::BrowserError(msg) => write!(f, "Browser error: {msg}"),
            Self::Cancelled => write!(f, "Crawl was cancelled"),
            Self::Other(msg) => write!(f, "Crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the full context chain
        Self::Other(format!("{err:#}"))
    }
}

impl From<redis::RedisError> for CrawlError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreError(err.to_string())
    }
}

/// Convenience alias for crawl results.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// True when a CDP error message indicates the browser or target died.
///
/// These surface during cancellation races (a page closed while an
/// operation was in flight) and are treated as cancellation upstream,
/// not as failures.
#[must_use]
pub fn is_browser_closed_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("browser closed")
        || lower.contains("target closed")
        || lower.contains("session closed")
        || lower.contains("connection closed")
        || lower.contains("websocket")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_error_codes_are_stable() {
        assert_eq!(ScrapeError::AtCapacity.code(), "CAPACITY");
        assert_eq!(ScrapeError::Timeout(30_000).code(), "TIMEOUT");
    }

    #[test]
    fn browser_closed_classification() {
        assert!(is_browser_closed_error("Target closed before response"));
        assert!(is_browser_closed_error("browser closed unexpectedly"));
        assert!(!is_browser_closed_error("navigation timeout"));
    }
}
