//! Request interception: ad/tracker blocking, crawl-mode media blocking,
//! and bot-detection script blocking on hard sites.
//!
//! Implemented over the CDP Fetch domain — every paused request is either
//! failed with `BlockedByClient` or continued untouched.

use std::sync::Arc;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use futures::StreamExt;
use tracing::{debug, trace};

use crate::fetch::matches_bot_detection;

/// Hosts serving ads, tracking or session-replay payloads. Blocking them
/// cuts bandwidth and removes the noisiest fingerprinting surfaces.
pub const AD_SERVING_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "adservice.google.com",
    "googlesyndication.com",
    "googletagservices.com",
    "googletagmanager.com",
    "google-analytics.com",
    "amazon-adsystem.com",
    "adnxs.com",
    "ads-twitter.com",
    "facebook.net",
    "fbcdn.net",
    "criteo.com",
    "criteo.net",
    "outbrain.com",
    "taboola.com",
    "moatads.com",
    "pubmatic.com",
    "rubiconproject.com",
    "openx.net",
    "casalemedia.com",
    "demdex.net",
    "scorecardresearch.com",
    "quantserve.com",
    "hotjar.com",
    "fullstory.com",
    "mouseflow.com",
    "newrelic.com",
    "nr-data.net",
    "adsystem.com",
    "bidswitch.net",
    "bluekai.com",
    "krxd.net",
    "advertising.com",
    "rlcdn.com",
    "smartadserver.com",
];

/// Resource types blocked in crawl mode. Images stay — they drive
/// lazy-load triggers and screenshot rendering.
const CRAWL_BLOCKED_RESOURCE_TYPES: &[&str] = &["media", "font"];

/// Interception policy for one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptPolicy {
    /// Abort media/font resource types (crawl mode).
    pub block_media: bool,
    /// Abort bot-detection vendor scripts (hard sites).
    pub block_bot_scripts: bool,
}

fn hostname_of(url: &str) -> Option<String> {
    let after_scheme = url.split("//").nth(1)?;
    Some(
        after_scheme
            .split('/')
            .next()?
            .split(':')
            .next()?
            .to_lowercase(),
    )
}

/// Decide whether a request should be aborted under the given policy.
#[must_use]
pub fn should_block(url: &str, resource_type: &str, policy: InterceptPolicy) -> bool {
    if let Some(hostname) = hostname_of(url) {
        if AD_SERVING_DOMAINS.iter().any(|d| hostname.contains(d)) {
            return true;
        }
    }
    if policy.block_bot_scripts && matches_bot_detection(url) {
        return true;
    }
    if policy.block_media {
        let rt = resource_type.to_lowercase();
        if CRAWL_BLOCKED_RESOURCE_TYPES.contains(&rt.as_str()) {
            return true;
        }
    }
    false
}

/// Enable Fetch-domain interception on a page and spawn the routing task.
/// The task ends when the page's event stream closes.
pub async fn install(page: &Page, policy: InterceptPolicy) -> anyhow::Result<()> {
    page.execute(EnableParams::default()).await?;

    let mut events = page.event_listener::<EventRequestPaused>().await?;
    let page = Arc::new(page.clone());

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let request_id = event.request_id.clone();
            let url = event.request.url.clone();
            let resource_type = format!("{:?}", event.resource_type);

            if should_block(&url, &resource_type, policy) {
                trace!(url, "aborting intercepted request");
                let Ok(fail) = FailRequestParams::builder()
                    .request_id(request_id)
                    .error_reason(ErrorReason::BlockedByClient)
                    .build()
                else {
                    continue;
                };
                if page.execute(fail).await.is_err() {
                    break;
                }
            } else {
                let Ok(proceed) = ContinueRequestParams::builder().request_id(request_id).build()
                else {
                    continue;
                };
                if page.execute(proceed).await.is_err() {
                    break;
                }
            }
        }
        debug!("request interception task ended");
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_ad_hosts() {
        let policy = InterceptPolicy::default();
        assert!(should_block(
            "https://stats.g.doubleclick.net/collect",
            "script",
            policy
        ));
        assert!(!should_block("https://example.com/app.js", "script", policy));
    }

    #[test]
    fn crawl_mode_blocks_media_and_fonts() {
        let policy = InterceptPolicy {
            block_media: true,
            block_bot_scripts: false,
        };
        assert!(should_block("https://example.com/bg.mp4", "media", policy));
        assert!(should_block("https://example.com/f.woff2", "font", policy));
        assert!(!should_block("https://example.com/hero.png", "image", policy));
    }

    #[test]
    fn hard_site_policy_blocks_detector_scripts() {
        let policy = InterceptPolicy {
            block_media: false,
            block_bot_scripts: true,
        };
        assert!(should_block(
            "https://js.datadome.co/tags.js",
            "script",
            policy
        ));
        let off = InterceptPolicy::default();
        assert!(!should_block("https://js.datadome.co/tags.js", "script", off));
    }
}
