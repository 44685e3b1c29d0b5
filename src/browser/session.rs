//! Crawl-scoped browser session.
//!
//! Minting a context per URL adds hundreds of milliseconds to every fetch
//! of a long BFS crawl — and worse, resets the fingerprint and cookies on
//! every page, which anti-bot systems notice. A crawl session holds one
//! stealth context for the whole crawl, recreating it lazily if it dies
//! and carrying accumulated cookies across recreations.

use std::sync::Arc;

use chromiumoxide::Page;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::browser::intercept::InterceptPolicy;
use crate::browser::{StealthBrowserPool, StealthPage};
use crate::error::{ScrapeError, is_browser_closed_error};
use crate::schema::ScrapeRequest;

/// Long-lived context wrapper for one crawl.
pub struct CrawlSession {
    pool: Arc<StealthBrowserPool>,
    request: ScrapeRequest,
    seed_url: String,
    context: Mutex<Option<StealthPage>>,
}

impl CrawlSession {
    /// Acquire the session context. Crawl mode blocks ads plus media and
    /// fonts; cookies for the seed domain are restored from the jar.
    pub async fn start(
        pool: Arc<StealthBrowserPool>,
        request: ScrapeRequest,
        seed_url: &str,
    ) -> Result<Self, ScrapeError> {
        let policy = InterceptPolicy {
            block_media: true,
            block_bot_scripts: crate::fetch::is_hard_site(seed_url),
        };
        let context = pool.get_page(&request, Some(seed_url), policy).await?;
        Ok(Self {
            pool,
            request,
            seed_url: seed_url.to_string(),
            context: Mutex::new(Some(context)),
        })
    }

    /// Run an operation against the session page. When the context has
    /// died (for example a cancelled navigation took the target with it),
    /// it is recreated once under the lock — cookies survive through the
    /// process-wide jar.
    pub async fn with_page<F, Fut, T>(&self, op: F) -> Result<T, ScrapeError>
    where
        F: Fn(Page) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut guard = self.context.lock().await;

        if let Some(ctx) = guard.as_ref() {
            match op(ctx.page().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if is_browser_closed_error(&e.to_string()) => {
                    warn!("crawl session context died, recreating");
                    if let Some(dead) = guard.take() {
                        dead.close().await;
                    }
                }
                Err(e) => return Err(ScrapeError::Browser(format!("{e:#}"))),
            }
        }

        let policy = InterceptPolicy {
            block_media: true,
            block_bot_scripts: crate::fetch::is_hard_site(&self.seed_url),
        };
        let fresh = self
            .pool
            .get_page(&self.request, Some(&self.seed_url), policy)
            .await?;
        let page = fresh.page().clone();
        *guard = Some(fresh);
        debug!("crawl session context recreated");

        op(page)
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))
    }

    /// Close the context and release the pool slot. Cookie persistence is
    /// part of the context close path.
    pub async fn stop(&self) {
        let mut guard = self.context.lock().await;
        if let Some(ctx) = guard.take() {
            ctx.close().await;
        }
        debug!("crawl session stopped");
    }
}
