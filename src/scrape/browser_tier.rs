//! Browser-tier navigation: the shared fetch path for tiers 3/4 and the
//! landing phase of the referrer-chain and pre-warm tiers.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use futures::StreamExt;
use rand::prelude::IndexedRandom;
use tracing::{debug, warn};

use crate::browser::{actions, challenge};
use crate::fetch::hard_sites::homepage_for_warmup;
use crate::schema::ScrapeRequest;

use super::humanize;

/// Hard cap on the initial navigation.
pub const NAV_TIMEOUT: Duration = Duration::from_secs(15);
/// Best-effort settle wait after the navigation commits.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
/// Overall challenge-solving budget.
pub const CHALLENGE_BUDGET_MS: u64 = 20_000;

const GOOGLE_REFERRERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.google.com/search?q=",
    "https://www.google.co.uk/",
];

/// What one browser navigation produced.
#[derive(Debug, Default)]
pub struct BrowserFetchOutput {
    pub html: String,
    pub status_code: u16,
    pub response_headers: HashMap<String, String>,
    pub screenshot: Option<String>,
    pub action_screenshots: Vec<String>,
}

#[must_use]
pub fn random_google_referrer() -> &'static str {
    let mut rng = rand::rng();
    GOOGLE_REFERRERS
        .choose(&mut rng)
        .copied()
        .unwrap_or(GOOGLE_REFERRERS[0])
}

fn headers_to_map(
    headers: &chromiumoxide::cdp::browser_protocol::network::Headers,
) -> HashMap<String, String> {
    serde_json::to_value(headers)
        .ok()
        .and_then(|v| {
            v.as_object().map(|obj| {
                obj.iter()
                    .filter_map(|(name, value)| {
                        value
                            .as_str()
                            .map(|s| (name.to_lowercase(), s.to_string()))
                    })
                    .collect()
            })
        })
        .unwrap_or_default()
}

/// Navigate with the standard wait discipline: hard-capped navigation,
/// best-effort settle, then a human jitter. Returns the main-document
/// response status and headers when observable.
pub async fn goto_with_waits(
    page: &Page,
    url: &str,
    referrer: Option<&str>,
) -> Result<(u16, HashMap<String, String>)> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("failed to attach response listener")?;

    let mut params = NavigateParams::builder().url(url.to_string());
    if let Some(referrer) = referrer {
        params = params.referrer(referrer.to_string());
    }
    let params = params
        .build()
        .map_err(|e| anyhow::anyhow!("navigate params build failed: {e}"))?;

    tokio::time::timeout(NAV_TIMEOUT, page.goto(params))
        .await
        .map_err(|_| anyhow::anyhow!("navigation timed out after {NAV_TIMEOUT:?}"))?
        .context("navigation failed")?;

    // Give JS a bounded window to render; never block on busy pages.
    if tokio::time::timeout(SETTLE_TIMEOUT, page.wait_for_navigation())
        .await
        .is_err()
    {
        debug!(url, "settle wait elapsed without idle");
    }
    humanize::sleep_range(500, 1000).await;

    // The main-document response should be buffered by now.
    let mut status = 0u16;
    let mut response_headers = HashMap::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(250), responses.next()).await
    {
        if matches!(event.r#type, ResourceType::Document) {
            status = u16::try_from(event.response.status).unwrap_or(0);
            response_headers = headers_to_map(&event.response.headers);
            break;
        }
    }

    Ok((status, response_headers))
}

/// The full browser-tier fetch on an already-configured stealth page:
/// optional hard-site homepage warm-up, navigation, challenge solving,
/// explicit waits, actions, screenshot, content readback.
pub async fn navigate_and_capture(
    page: &Page,
    request: &ScrapeRequest,
    target_url: &str,
    hard_site: bool,
) -> Result<BrowserFetchOutput> {
    let referrer = random_google_referrer();

    // Hard sites get a homepage visit first so the session carries
    // first-party cookies before the deep link.
    if hard_site {
        if let Some(homepage) = homepage_for_warmup(target_url) {
            let warmup = async {
                goto_with_waits(page, &homepage, Some(referrer)).await?;
                humanize::sleep_range(1500, 3000).await;
                humanize::try_accept_cookies(page).await;
                humanize::sleep_range(500, 1000).await;
                Ok::<(), anyhow::Error>(())
            };
            match tokio::time::timeout(Duration::from_secs(10), warmup).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "homepage warm-up failed"),
                Err(_) => debug!("homepage warm-up timed out"),
            }
        }
    }

    let (mut status_code, response_headers) =
        goto_with_waits(page, target_url, Some(referrer)).await?;

    if challenge::is_challenge(page).await {
        if challenge::solve(page, CHALLENGE_BUDGET_MS).await {
            debug!(url = target_url, "challenge solved");
        } else {
            warn!(url = target_url, "challenge unsolved, capturing as-is");
        }
    }

    if request.wait_for > 0 {
        tokio::time::sleep(Duration::from_millis(request.wait_for.min(30_000))).await;
    }

    let action_screenshots = if request.actions.is_empty() {
        Vec::new()
    } else {
        actions::execute_actions(page, &request.actions).await
    };

    let screenshot = if request.wants("screenshot") {
        match actions::full_page_screenshot(page).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(error = %e, "screenshot capture failed");
                None
            }
        }
    } else {
        None
    };

    let html = page.content().await.context("content readback failed")?;
    if status_code == 0 && html.len() > 500 {
        status_code = 200;
    }

    Ok(BrowserFetchOutput {
        html,
        status_code,
        response_headers,
        screenshot,
        action_screenshots,
    })
}
