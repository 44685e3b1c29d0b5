//! webharvest — anti-detection web scraping and crawling engine.
//!
//! Three job types share one core: single-page scrape, priority BFS
//! crawl, and search-then-scrape. The core is the 8-tier fetch cascade
//! ([`scrape`]), the stealth browser pool ([`browser`]), the content
//! extraction pipeline ([`extract`]), and the crawl engine ([`crawl`]).

pub mod browser;
pub mod cache;
pub mod config;
pub mod crawl;
pub mod detect;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod jobs;
pub mod proxy;
pub mod schema;
pub mod scrape;
pub mod sidecar;
pub mod store;
pub mod urlnorm;

pub use browser::StealthBrowserPool;
pub use config::Settings;
pub use crawl::CrawlEngine;
pub use detect::BlockDetector;
pub use error::{CrawlError, CrawlResult, ScrapeError};
pub use jobs::{JobStatus, JobStore, MemoryJobStore, RedisJobStore};
pub use schema::{CrawlRequest, FetchResult, PageMetadata, ScrapeArtifact, ScrapeRequest};
pub use scrape::ScrapeEngine;
pub use store::SharedStore;

use std::sync::Arc;

/// Wire up a scrape engine from settings: browser pool plus a store
/// connection.
pub async fn build_engine(settings: Arc<Settings>) -> anyhow::Result<Arc<ScrapeEngine>> {
    let pool = StealthBrowserPool::new(
        settings.chromium_pool_size,
        settings.firefox_pool_size,
        settings.browser_headless,
    );
    let store = SharedStore::connect(&settings.redis_url).await?;
    Ok(Arc::new(ScrapeEngine::new(settings, pool, store)))
}

/// Run a crawl job end to end.
pub async fn crawl(
    job_id: &str,
    request: CrawlRequest,
    engine: Arc<ScrapeEngine>,
    settings: Arc<Settings>,
    job_store: Arc<dyn JobStore>,
) -> CrawlResult<()> {
    let crawler = CrawlEngine::initialize(job_id, request, engine, &settings, job_store).await?;
    crawler.run().await
}
