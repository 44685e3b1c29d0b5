//! Strategy orchestrator: the 8-tier fetch cascade with block detection,
//! best-partial tracking, short-circuit paths, and the extraction
//! hand-off.

pub mod browser_tier;
pub mod humanize;
pub mod prewarm;
pub mod referrer_chain;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::browser::fingerprint::BrowserEngine;
use crate::browser::intercept::InterceptPolicy;
use crate::browser::session::CrawlSession;
use crate::browser::{StealthBrowserPool, discovery};
use crate::cache;
use crate::config::Settings;
use crate::detect::BlockDetector;
use crate::error::ScrapeError;
use crate::fetch::{self, tier_names};
use crate::proxy::Proxy;
use crate::schema::{FetchResult, ScrapeArtifact, ScrapeRequest};
use crate::sidecar::SidecarClient;
use crate::store::SharedStore;

/// Extensions the HTML cascade cannot serve; document extraction is an
/// external collaborator.
const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".rtf",
];

/// The scrape entry point shared by the API worker and the crawl engine.
pub struct ScrapeEngine {
    settings: Arc<Settings>,
    pool: Arc<StealthBrowserPool>,
    sidecar: Option<SidecarClient>,
    store: SharedStore,
    detector: BlockDetector,
}

impl ScrapeEngine {
    #[must_use]
    pub fn new(settings: Arc<Settings>, pool: Arc<StealthBrowserPool>, store: SharedStore) -> Self {
        let sidecar = settings
            .stealth_engine_url
            .as_deref()
            .and_then(SidecarClient::new);
        Self {
            settings,
            pool,
            sidecar,
            store,
            detector: BlockDetector::new(),
        }
    }

    #[must_use]
    pub fn browser_pool(&self) -> Arc<StealthBrowserPool> {
        Arc::clone(&self.pool)
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub fn detector(&self) -> &BlockDetector {
        &self.detector
    }

    fn usable(&self, result: &FetchResult) -> bool {
        !result.raw_html.is_empty()
            && result.status_code < 400
            && !self.detector.is_blocked(&result.raw_html)
    }

    /// Scrape one URL: cache, cascade, extraction.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeArtifact, ScrapeError> {
        self.scrape_with_session(request, None).await
    }

    /// Scrape through an optional crawl session (which supplies the
    /// persistent browser context for tiers 3+).
    pub async fn scrape_with_session(
        &self,
        request: &ScrapeRequest,
        session: Option<&CrawlSession>,
    ) -> Result<ScrapeArtifact, ScrapeError> {
        let overall = Duration::from_secs(self.settings.scrape_api_timeout_secs);
        match tokio::time::timeout(overall, self.scrape_inner(request, session)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout(overall.as_millis() as u64)),
        }
    }

    async fn scrape_inner(
        &self,
        request: &ScrapeRequest,
        session: Option<&CrawlSession>,
    ) -> Result<ScrapeArtifact, ScrapeError> {
        let url = Url::parse(&request.url)
            .map_err(|e| ScrapeError::InvalidRequest(format!("bad url: {e}")))?;

        let path_lower = url.path().to_lowercase();
        if let Some(ext) = DOCUMENT_EXTENSIONS.iter().find(|e| path_lower.ends_with(*e)) {
            return Err(ScrapeError::UnsupportedDocument((*ext).to_string()));
        }

        // Cache only plain fetches — actions and screenshots are
        // request-specific artifacts.
        let cacheable = request.actions.is_empty() && !request.wants("screenshot");
        if cacheable {
            if let Some(cached) =
                cache::get_cached_scrape(&self.store, &request.url, &request.formats).await
            {
                debug!(url = %request.url, "scrape cache hit");
                return Ok(cached);
            }
        }

        let (fetched, best_partial) = self.fetch_cascade(request, session).await;

        let (fetch_result, genuine) = match fetched {
            Some(result) => (result, true),
            None => match best_partial {
                Some(partial) => {
                    warn!(
                        url = %request.url,
                        chars = partial.raw_html.len(),
                        code = crate::detect::classify_failure(&partial.raw_html, partial.status_code),
                        "all tiers blocked, using best partial"
                    );
                    (partial, false)
                }
                None => {
                    warn!(url = %request.url, "all tiers failed with no content");
                    return Ok(ScrapeArtifact::empty(&request.url, 0));
                }
            },
        };

        // CPU-bound extraction runs off the scheduler.
        let artifact = {
            let fetch_clone = fetch_result.clone();
            let request_clone = request.clone();
            tokio::task::spawn_blocking(move || {
                crate::extract::extract_artifact(&fetch_clone, &request_clone)
            })
            .await
            .map_err(|e| ScrapeError::Browser(format!("extraction task failed: {e}")))?
        };

        if cacheable && genuine {
            cache::set_cached_scrape(&self.store, &request.url, &request.formats, &artifact).await;
        }

        Ok(artifact)
    }

    /// Run the cascade and return the raw fetch without extraction — the
    /// crawl fast path, where extraction is deferred to the consumer's
    /// worker pool.
    pub async fn fetch_only(
        &self,
        request: &ScrapeRequest,
        session: Option<&CrawlSession>,
    ) -> Option<FetchResult> {
        let (fetched, best_partial) = self.fetch_cascade(request, session).await;
        fetched.or(best_partial)
    }

    async fn proxy_for(&self, url: &Url, request: &ScrapeRequest) -> Option<Proxy> {
        if !request.use_proxy {
            return None;
        }
        let pool = crate::proxy::builtin_pool(&self.settings, self.store.clone()).await?;
        let domain = url.host_str()?;
        pool.get_for_domain(domain).await
    }

    /// The 8-tier escalation loop. Returns `(success, best_partial)`.
    async fn fetch_cascade(
        &self,
        request: &ScrapeRequest,
        session: Option<&CrawlSession>,
    ) -> (Option<FetchResult>, Option<FetchResult>) {
        let Ok(url) = Url::parse(&request.url) else {
            return (None, None);
        };
        let hard_site = fetch::is_hard_site(&request.url);
        let needs_browser = request.needs_browser();
        let proxy = self.proxy_for(&url, request).await;

        let mut best_partial: Option<FetchResult> = None;

        // Tier 1: TLS-impersonating multi-profile (skipped when a browser
        // is demanded — start at tier 3 instead).
        if !needs_browser {
            if let Some(result) = fetch::tls::fetch(
                &request.url,
                request.timeout,
                &request.headers,
                proxy.as_ref(),
                &self.detector,
            )
            .await
            {
                if result.best && self.usable(&result) {
                    info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                    return (Some(result), best_partial);
                }
                track_partial(&mut best_partial, result);
            }
        }

        // Tier 2: plain HTTP/2 with rotating headers (soft sites only).
        if !needs_browser && !hard_site {
            if let Some(result) =
                fetch::http2::fetch(&request.url, request.timeout, &request.headers, proxy.as_ref())
                    .await
            {
                if self.usable(&result) {
                    let mut result = result;
                    result.best = true;
                    info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                    return (Some(result), best_partial);
                }
                track_partial(&mut best_partial, result);
            }
        }

        // Tier 3: stealth Chromium.
        if let Some(result) = self
            .fetch_browser(request, hard_site, session, BrowserEngine::Chromium, proxy.as_ref())
            .await
        {
            if !result.raw_html.is_empty() && !self.detector.is_blocked(&result.raw_html) {
                let mut result = result;
                result.best = true;
                info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                return (Some(result), best_partial);
            }
            track_partial(&mut best_partial, result);
        }

        // Tier 4: stealth Firefox, available through the sidecar.
        if let Some(sidecar) = &self.sidecar {
            if let Ok(_slot) = self.pool.acquire_firefox_slot().await {
                if let Some(result) = sidecar
                    .fetch(request, BrowserEngine::Firefox, proxy.as_ref())
                    .await
                {
                    if !result.raw_html.is_empty() && !self.detector.is_blocked(&result.raw_html) {
                        let mut result = result;
                        result.best = true;
                        info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                        return (Some(result), best_partial);
                    }
                    track_partial(&mut best_partial, result);
                }
            }
        }

        // Tiers 5 & 6 only make sense against hard sites.
        if hard_site {
            if let Some(result) = self.fetch_referrer_chain(request, &url).await {
                if !result.raw_html.is_empty() && !self.detector.is_blocked(&result.raw_html) {
                    let mut result = result;
                    result.best = true;
                    info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                    return (Some(result), best_partial);
                }
                track_partial(&mut best_partial, result);
            }

            if let Some(result) = self.fetch_prewarm(request, &url).await {
                if !result.raw_html.is_empty() && !self.detector.is_blocked(&result.raw_html) {
                    let mut result = result;
                    result.best = true;
                    info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                    return (Some(result), best_partial);
                }
                track_partial(&mut best_partial, result);
            }
        }

        // Tier 7: public web cache (the adapter pre-screens blocks).
        if let Some(result) =
            fetch::webcache::fetch(&request.url, request.timeout, proxy.as_ref(), &self.detector)
                .await
        {
            let mut result = result;
            result.best = true;
            info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
            return (Some(result), best_partial);
        }

        // Tier 8: web archive, last resort.
        if let Some(result) =
            fetch::archive::fetch(&request.url, request.timeout, proxy.as_ref()).await
        {
            if result.raw_html.len() > 500 {
                let mut result = result;
                result.best = true;
                info!(url = %request.url, tier = %result.source_tier, "fetch succeeded");
                return (Some(result), best_partial);
            }
            track_partial(&mut best_partial, result);
        }

        (None, best_partial)
    }

    async fn fetch_browser(
        &self,
        request: &ScrapeRequest,
        hard_site: bool,
        session: Option<&CrawlSession>,
        engine: BrowserEngine,
        proxy: Option<&Proxy>,
    ) -> Option<FetchResult> {
        // Sidecar preferred when configured; it supports per-request
        // proxies and both engines.
        if let Some(sidecar) = &self.sidecar {
            return sidecar.fetch(request, engine, proxy).await;
        }
        if engine == BrowserEngine::Firefox {
            return None;
        }

        let target = request.url.clone();
        if let Some(session) = session {
            let session_request = request.clone();
            return match session
                .with_page(move |page| {
                    let request = session_request.clone();
                    let target = target.clone();
                    async move {
                        browser_tier::navigate_and_capture(&page, &request, &target, hard_site)
                            .await
                    }
                })
                .await
            {
                Ok(output) => Some(to_fetch_result(output, tier_names::CHROMIUM)),
                Err(e) => {
                    debug!(url = %request.url, error = %e, "session browser fetch failed");
                    None
                }
            };
        }

        let policy = InterceptPolicy {
            block_media: false,
            block_bot_scripts: hard_site,
        };
        let context = match self.pool.get_page(request, Some(&request.url), policy).await {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(url = %request.url, error = %e, "browser context unavailable");
                return None;
            }
        };

        let output =
            browser_tier::navigate_and_capture(context.page(), request, &request.url, hard_site)
                .await;
        context.close().await;

        match output {
            Ok(output) => Some(to_fetch_result(output, tier_names::CHROMIUM)),
            Err(e) => {
                debug!(url = %request.url, error = %e, "chromium tier failed");
                None
            }
        }
    }

    async fn fetch_referrer_chain(
        &self,
        request: &ScrapeRequest,
        url: &Url,
    ) -> Option<FetchResult> {
        let policy = InterceptPolicy {
            block_media: false,
            block_bot_scripts: true,
        };
        let context = self
            .pool
            .get_page(request, Some(&request.url), policy)
            .await
            .ok()?;
        let output = referrer_chain::fetch(context.page(), request, url).await;
        context.close().await;

        match output {
            Ok(output) => Some(to_fetch_result(output, tier_names::GOOGLE_CHAIN)),
            Err(e) => {
                debug!(url = %request.url, error = %e, "referrer chain failed");
                None
            }
        }
    }

    async fn fetch_prewarm(&self, request: &ScrapeRequest, url: &Url) -> Option<FetchResult> {
        let policy = InterceptPolicy {
            block_media: false,
            block_bot_scripts: true,
        };
        let context = self
            .pool
            .get_page(request, Some(&request.url), policy)
            .await
            .ok()?;
        let output = prewarm::fetch(context.page(), request, url, &self.detector).await;
        context.close().await;

        match output {
            Ok(output) => Some(to_fetch_result(output, tier_names::PREWARM)),
            Err(e) => {
                debug!(url = %request.url, error = %e, "pre-warm tier failed");
                None
            }
        }
    }

    /// One-shot deep nav discovery for `map` and for crawl frontier
    /// seeding: sidecar first, local stealth browser as fallback.
    pub async fn discover_links(&self, url: &str) -> (Vec<String>, Option<String>) {
        if let Some(sidecar) = &self.sidecar {
            if let Some((links, framework)) = sidecar.discover(url).await {
                return (links, framework);
            }
        }

        let request = ScrapeRequest::new(url);
        let policy = InterceptPolicy {
            block_media: true,
            block_bot_scripts: fetch::is_hard_site(url),
        };
        let context = match self.pool.get_page(&request, Some(url), policy).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(url, error = %e, "discovery context unavailable");
                return (Vec::new(), None);
            }
        };

        let result = match browser_tier::goto_with_waits(context.page(), url, None).await {
            Ok(_) => discovery::discover_nav_links(context.page()).await,
            Err(e) => {
                warn!(url, error = %e, "discovery navigation failed");
                discovery::DiscoveryResult::default()
            }
        };
        context.close().await;

        (result.links, result.framework)
    }
}

/// Keep the longest non-empty payload seen across tiers as the
/// last-resort fallback.
fn track_partial(best: &mut Option<FetchResult>, mut candidate: FetchResult) {
    candidate.best = false;
    let longer = best.as_ref().map_or(!candidate.raw_html.is_empty(), |b| {
        candidate.raw_html.len() > b.raw_html.len()
    });
    if longer {
        *best = Some(candidate);
    }
}

fn to_fetch_result(output: browser_tier::BrowserFetchOutput, tier: &str) -> FetchResult {
    FetchResult {
        raw_html: output.html,
        status_code: output.status_code,
        response_headers: output.response_headers,
        source_tier: tier.to_string(),
        best: false,
        screenshot: output.screenshot,
        action_screenshots: output.action_screenshots,
    }
}
