//! Priority BFS crawl engine.
//!
//! A store-backed frontier feeds a producer–consumer pipeline: the
//! producer pops priority-ordered batches and fetches them through the
//! persistent crawl session (fast path: HTTP tiers with extraction
//! deferred), the consumer extracts on the blocking pool, applies the
//! quality gate, persists results and reseeds the frontier with
//! discovered links.

pub mod admission;
pub mod frontier;
pub mod quality;
pub mod robots;
pub mod score;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::browser::session::CrawlSession;
use crate::config::Settings;
use crate::error::{CrawlError, CrawlResult};
use crate::jobs::{JobResult, JobStatus, JobStore, WebhookPayload, send_webhook};
use crate::schema::{CrawlRequest, FetchResult, ScrapeArtifact, ScrapeRequest};
use crate::scrape::ScrapeEngine;
use crate::store::SharedStore;
use crate::urlnorm::normalize_url;

use admission::UrlFilter;
use frontier::Frontier;
use robots::RobotsCache;

/// Fetch budget for the fast (fetch-only) path.
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);
/// Budget for the fallback full scrape — the fast path already spent its
/// share of patience.
const SCRAPE_FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);
/// Frontier growth cap multiplier over `max_pages`.
const FRONTIER_CAP_FACTOR: usize = 5;

enum PipelineItem {
    /// Raw fetch awaiting extraction (fast path).
    Fetched {
        url: String,
        depth: u32,
        fetch: Box<FetchResult>,
    },
    /// Already extracted via the fallback full scrape.
    Scraped {
        url: String,
        depth: u32,
        artifact: Box<ScrapeArtifact>,
    },
}

/// One crawl job. Owns a dedicated store connection, the persistent
/// browser session, and the three frontier keys for its lifetime.
pub struct CrawlEngine {
    job_id: String,
    config: CrawlRequest,
    scrape_opts: ScrapeRequest,
    engine: Arc<ScrapeEngine>,
    job_store: Arc<dyn JobStore>,
    frontier: Frontier,
    filter: UrlFilter,
    robots: RobotsCache,
    session: Option<CrawlSession>,
    detected_framework: Option<String>,
}

impl CrawlEngine {
    /// Validate and cap the config, open the store connection, seed the
    /// frontier (start URL + deep JS nav discovery), and start the
    /// persistent crawl session.
    pub async fn initialize(
        job_id: &str,
        mut config: CrawlRequest,
        engine: Arc<ScrapeEngine>,
        settings: &Settings,
        job_store: Arc<dyn JobStore>,
    ) -> CrawlResult<Self> {
        config.max_pages = config.max_pages.clamp(1, settings.max_crawl_pages);
        config.concurrency = config.concurrency.clamp(1, 10);

        let filter = UrlFilter::new(&config)?;

        // Crawl-owned connection: a store hiccup here fails only this job.
        let store = SharedStore::connect(&settings.redis_url)
            .await
            .map_err(|e| CrawlError::StoreError(format!("{e:#}")))?;
        let frontier = Frontier::new(store, job_id);

        let mut scrape_opts = config
            .scrape_options
            .clone()
            .unwrap_or_else(|| ScrapeRequest::new(&config.url));
        scrape_opts.url = config.url.clone();
        if !scrape_opts.wants("links") {
            scrape_opts.formats.push("links".to_string());
        }
        scrape_opts.use_proxy = config.use_proxy;

        let mut crawler = Self {
            job_id: job_id.to_string(),
            config,
            scrape_opts,
            engine,
            job_store,
            frontier,
            filter,
            robots: RobotsCache::new(),
            session: None,
            detected_framework: None,
        };

        crawler.seed_frontier().await?;
        crawler.start_session().await;
        Ok(crawler)
    }

    #[must_use]
    pub fn detected_framework(&self) -> Option<&str> {
        self.detected_framework.as_deref()
    }

    async fn seed_frontier(&mut self) -> CrawlResult<()> {
        let start_url = self.config.url.clone();

        // Start URL gets a boost so it always pops first.
        let start_score = score::score_url(&start_url) + 100.0;
        self.frontier
            .add(&start_url, start_score, 0)
            .await
            .map_err(CrawlError::from)?;
        self.frontier.touch_ttl().await.map_err(CrawlError::from)?;

        // Doc sites render their nav via JS; without discovery the BFS
        // stalls after a page or two.
        let (links, framework) = self.engine.discover_links(&start_url).await;
        if let Some(framework) = framework {
            info!(job_id = %self.job_id, framework, "doc framework detected");
            self.detected_framework = Some(framework);
        }

        let cap = self.config.max_pages * FRONTIER_CAP_FACTOR;
        let mut added = 0usize;
        for link in links {
            if added >= cap {
                break;
            }
            let Some(normalized) = normalize_url(&link, None) else {
                continue;
            };
            if self
                .frontier
                .is_visited(&normalized)
                .await
                .map_err(CrawlError::from)?
            {
                continue;
            }
            if !self.filter.should_crawl(&link, 1) {
                continue;
            }
            self.frontier
                .add(&link, score::score_url(&link), 1)
                .await
                .map_err(CrawlError::from)?;
            added += 1;
        }
        if added > 0 {
            info!(job_id = %self.job_id, added, "frontier pre-seeded from nav discovery");
        }
        Ok(())
    }

    async fn start_session(&mut self) {
        match CrawlSession::start(
            self.engine.browser_pool(),
            self.scrape_opts.clone(),
            &self.config.url,
        )
        .await
        {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                // HTTP tiers carry the crawl when no browser is available.
                warn!(job_id = %self.job_id, error = %e, "crawl session unavailable");
            }
        }
    }

    /// Add discovered links at a depth, respecting admissibility, robots
    /// and the frontier growth cap.
    async fn add_links(&self, links: &[String], depth: u32) -> CrawlResult<()> {
        for link in links {
            let Some(normalized) = normalize_url(link, None) else {
                continue;
            };
            if self
                .frontier
                .is_visited(&normalized)
                .await
                .map_err(CrawlError::from)?
            {
                continue;
            }
            if !self.filter.should_crawl(link, depth) {
                continue;
            }
            if self.config.respect_robots_txt && !self.robots.is_allowed(link).await {
                continue;
            }

            let visited = self.frontier.visited_count().await.map_err(CrawlError::from)?;
            let frontier_size = self.frontier.size().await.map_err(CrawlError::from)?;
            if visited + frontier_size >= (self.config.max_pages * FRONTIER_CAP_FACTOR) as u64 {
                break;
            }

            self.frontier
                .add(link, score::frontier_score(link, depth), depth)
                .await
                .map_err(CrawlError::from)?;
        }
        Ok(())
    }

    /// Run the crawl to completion (or cancellation). Persists results
    /// through the job store; the frontier keys and session are cleaned
    /// up on every exit path.
    pub async fn run(&self) -> CrawlResult<()> {
        self.job_store
            .set_status(&self.job_id, JobStatus::Running)
            .await
            .map_err(|e| CrawlError::Other(format!("{e:#}")))?;
        let _ = self.job_store.set_total_pages(&self.job_id, self.config.max_pages).await;
        let _ = self.job_store.mark_started(&self.job_id).await;

        let result = self.run_pipeline().await;

        // Cleanup happens regardless of how the pipeline ended.
        if let Err(e) = self.frontier.clear().await {
            debug!(job_id = %self.job_id, error = %e, "frontier cleanup failed");
        }
        if let Some(session) = &self.session {
            session.stop().await;
        }

        match &result {
            Ok(pages) => {
                let status = self.job_store.get_status(&self.job_id).await.ok().flatten();
                if status == Some(JobStatus::Cancelled) {
                    // Cancelled jobs must not serve a stale cached response.
                    crate::cache::invalidate_job_response(
                        self.engine.store(),
                        &self.job_id,
                        self.config.max_pages as u32,
                    )
                    .await;
                } else {
                    let _ = self.job_store.set_status(&self.job_id, JobStatus::Completed).await;
                    let _ = self.job_store.set_total_pages(&self.job_id, *pages).await;
                    let _ = self.job_store.set_completed_pages(&self.job_id, *pages).await;
                    let _ = self.job_store.mark_completed_at(&self.job_id).await;
                }
                self.deliver_webhook(*pages, None).await;
                Ok(())
            }
            Err(e) => {
                let _ = self.job_store.set_status(&self.job_id, JobStatus::Failed).await;
                let _ = self.job_store.set_error(&self.job_id, &e.to_string()).await;
                self.deliver_webhook(0, Some(&e.to_string())).await;
                Err(e.clone())
            }
        }
    }

    async fn deliver_webhook(&self, pages: usize, error: Option<&str>) {
        let Some(webhook_url) = &self.config.webhook_url else {
            return;
        };
        let status = self
            .job_store
            .get_status(&self.job_id)
            .await
            .ok()
            .flatten()
            .unwrap_or(JobStatus::Completed);
        let event = match (error, status) {
            (Some(_), _) => "job.failed",
            (None, JobStatus::Cancelled) => "job.cancelled",
            _ => "job.completed",
        };
        send_webhook(
            webhook_url,
            &WebhookPayload {
                event,
                job_id: &self.job_id,
                job_type: "crawl",
                status: status.as_str(),
                total_pages: Some(pages),
                completed_pages: Some(pages),
                error,
            },
            self.config.webhook_secret.as_deref(),
        )
        .await;
    }

    /// The producer–consumer pipeline. Returns pages crawled.
    async fn run_pipeline(&self) -> CrawlResult<usize> {
        let concurrency = self.config.concurrency;
        let max_pages = self.config.max_pages;

        let (tx, mut rx) = mpsc::channel::<PipelineItem>(concurrency * 2);
        let pages_crawled = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(Notify::new());
        let fetch_slots = Arc::new(Semaphore::new(concurrency));

        let producer = {
            let tx = tx.clone();
            let pages_crawled = Arc::clone(&pages_crawled);
            let cancelled = Arc::clone(&cancelled);
            let in_flight = Arc::clone(&in_flight);
            let drained = Arc::clone(&drained);
            let fetch_slots = Arc::clone(&fetch_slots);

            async move {
                let mut empty_retries = 0u32;

                while pages_crawled.load(Ordering::Relaxed) < max_pages
                    && !cancelled.load(Ordering::Relaxed)
                {
                    // Pop a priority-ordered batch, skipping visited URLs.
                    let remaining = max_pages - pages_crawled.load(Ordering::Relaxed);
                    let batch_size = (concurrency * 2).min(remaining);
                    let mut batch: Vec<(String, u32)> = Vec::new();

                    while batch.len() < batch_size {
                        match self.frontier.pop_max().await {
                            Ok(Some((url, depth))) => {
                                let normalized =
                                    normalize_url(&url, None).unwrap_or_else(|| url.clone());
                                match self.frontier.is_visited(&normalized).await {
                                    Ok(true) => continue,
                                    Ok(false) => {}
                                    Err(e) => return Err(CrawlError::from(e)),
                                }
                                self.frontier
                                    .mark_visited(&normalized)
                                    .await
                                    .map_err(CrawlError::from)?;
                                batch.push((url, depth));
                            }
                            Ok(None) => break,
                            Err(e) => return Err(CrawlError::from(e)),
                        }
                    }

                    if batch.is_empty() {
                        // The consumer may still be extracting links that
                        // will reseed the frontier; wait for the pipeline
                        // to drain before giving up.
                        if in_flight.load(Ordering::Relaxed) > 0 {
                            let _ = tokio::time::timeout(
                                Duration::from_secs(2),
                                drained.notified(),
                            )
                            .await;
                            empty_retries = 0;
                            continue;
                        } else if empty_retries < 3 {
                            empty_retries += 1;
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            continue;
                        }
                        break;
                    }
                    empty_retries = 0;

                    let fetches = batch.into_iter().map(|(url, depth)| {
                        let fetch_slots = Arc::clone(&fetch_slots);
                        async move {
                            let _slot = match fetch_slots.acquire().await {
                                Ok(slot) => slot,
                                Err(_) => return None,
                            };
                            self.fetch_one(url, depth).await
                        }
                    });

                    for item in futures::future::join_all(fetches).await.into_iter().flatten() {
                        in_flight.fetch_add(1, Ordering::Relaxed);
                        if tx.send(item).await.is_err() {
                            // Consumer is gone; nothing more to produce.
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            return Ok(());
                        }
                    }
                }
                Ok(())
            }
        };

        let consumer = {
            let pages_crawled = Arc::clone(&pages_crawled);
            let cancelled = Arc::clone(&cancelled);
            let in_flight = Arc::clone(&in_flight);
            let drained = Arc::clone(&drained);

            async move {
                while let Some(item) = rx.recv().await {
                    let outcome = self
                        .consume_item(item, &pages_crawled, &cancelled)
                        .await;
                    in_flight.fetch_sub(1, Ordering::Relaxed);
                    drained.notify_waiters();
                    if let Err(e) = outcome {
                        warn!(job_id = %self.job_id, error = %e, "consume failed");
                    }
                }
                Ok::<(), CrawlError>(())
            }
        };

        // Drop the original sender so the consumer ends when the producer
        // finishes.
        drop(tx);

        let (produced, consumed) = tokio::join!(producer, consumer);
        produced?;
        consumed?;

        Ok(pages_crawled.load(Ordering::Relaxed))
    }

    /// Fetch one URL: fast path first (HTTP tiers, extraction deferred),
    /// then the fallback full scrape.
    async fn fetch_one(&self, url: String, depth: u32) -> Option<PipelineItem> {
        debug!(job_id = %self.job_id, url, depth, "crawling");

        let mut fetch_request = self.scrape_opts.clone();
        fetch_request.url = url.clone();
        // The fast path must stay browser-optional: screenshots are
        // captured by the consumer when requested.
        fetch_request.formats.retain(|f| f != "screenshot");

        let fast = tokio::time::timeout(
            FETCH_TIMEOUT,
            self.engine.fetch_only(&fetch_request, self.session.as_ref()),
        )
        .await;

        match fast {
            Ok(Some(fetch)) => {
                return Some(PipelineItem::Fetched {
                    url,
                    depth,
                    fetch: Box::new(fetch),
                });
            }
            Ok(None) => {}
            Err(_) => {
                warn!(job_id = %self.job_id, url, "fetch timed out");
                return None;
            }
        }

        let mut scrape_request = self.scrape_opts.clone();
        scrape_request.url = url.clone();
        match tokio::time::timeout(
            SCRAPE_FALLBACK_TIMEOUT,
            self.engine
                .scrape_with_session(&scrape_request, self.session.as_ref()),
        )
        .await
        {
            Ok(Ok(artifact)) => Some(PipelineItem::Scraped {
                url,
                depth,
                artifact: Box::new(artifact),
            }),
            Ok(Err(e)) => {
                warn!(job_id = %self.job_id, url, error = %e, "fallback scrape failed");
                None
            }
            Err(_) => {
                warn!(job_id = %self.job_id, url, "fallback scrape timed out");
                None
            }
        }
    }

    async fn consume_item(
        &self,
        item: PipelineItem,
        pages_crawled: &AtomicUsize,
        cancelled: &AtomicBool,
    ) -> CrawlResult<()> {
        let (url, depth, artifact) = match item {
            PipelineItem::Scraped { url, depth, artifact } => (url, depth, *artifact),
            PipelineItem::Fetched { url, depth, fetch } => {
                // CPU-bound extraction off the scheduler.
                let mut request = self.scrape_opts.clone();
                request.url = url.clone();
                let artifact = tokio::task::spawn_blocking(move || {
                    crate::extract::extract_artifact(&fetch, &request)
                })
                .await
                .map_err(|e| CrawlError::Other(format!("extraction task failed: {e}")))?;
                (url, depth, artifact)
            }
        };

        let discovered: Vec<String> = artifact.links.clone().unwrap_or_default();

        // Quality gate: skipped pages still seed the frontier but never
        // count toward max_pages.
        let markdown = artifact.markdown.as_deref().unwrap_or_default();
        if let Some(reason) = quality::evaluate(markdown) {
            info!(
                job_id = %self.job_id,
                url,
                reason = reason.as_str(),
                words = markdown.split_whitespace().count(),
                "skipping low-quality page"
            );
            self.add_links(&discovered, depth + 1).await?;
            return Ok(());
        }

        let metadata = serde_json::to_value(&artifact.metadata).ok();
        self.job_store
            .add_result(
                &self.job_id,
                JobResult {
                    url: url.clone(),
                    markdown: artifact.markdown.clone(),
                    html: artifact.html.clone(),
                    links: artifact.links.clone(),
                    extract: None,
                    metadata,
                    screenshot_url: artifact.screenshot.clone(),
                    created_at: chrono::Utc::now(),
                },
            )
            .await
            .map_err(|e| CrawlError::Other(format!("{e:#}")))?;

        let completed = pages_crawled.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.job_store.set_completed_pages(&self.job_id, completed).await;

        // Cancellation is observed at persisted-update boundaries.
        if self.job_store.get_status(&self.job_id).await.ok().flatten()
            == Some(JobStatus::Cancelled)
        {
            info!(job_id = %self.job_id, "cancellation observed, winding down");
            cancelled.store(true, Ordering::Relaxed);
        }

        self.add_links(&discovered, depth + 1).await?;
        Ok(())
    }
}
