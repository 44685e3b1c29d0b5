//! Tier 7: public web-cache fallback.
//!
//! Fetches the Google cache copy of a page — the cache frontend sits in
//! front of every site-level protection. The injected cache banner is
//! stripped before the HTML is returned.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::detect::BlockDetector;
use crate::fetch::headers::TlsProfile;
use crate::fetch::tier_names;
use crate::proxy::Proxy;
use crate::schema::FetchResult;

static CACHE_HDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*(?:id|class)=["']google-cache-hdr["'][^>]*>.*?</div>\s*(?:</div>)*"#)
        .expect("SAFETY: hardcoded cache-banner regex is statically valid")
});

static CACHE_NOTICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<div[^>]*style=["'][^"']*text-align:\s*center[^"']*["'][^>]*>.*?This is Google's cache.*?</div>"#,
    )
    .expect("SAFETY: hardcoded cache-notice regex is statically valid")
});

/// Remove the cache header/banner fragments from cached HTML.
#[must_use]
pub fn strip_cache_banner(html: &str) -> String {
    let html = CACHE_HDR_RE.replacen(html, 1, "");
    CACHE_NOTICE_RE.replacen(&html, 1, "").into_owned()
}

/// Fetch the cached copy with a google.com referrer. Returns `None` when
/// the cache has no usable copy.
pub async fn fetch(
    url: &str,
    timeout_ms: u64,
    proxy: Option<&Proxy>,
    detector: &BlockDetector,
) -> Option<FetchResult> {
    let cache_url = format!(
        "https://webcache.googleusercontent.com/search?q=cache:{}",
        urlencoding::encode(url)
    );

    let mut builder = rquest::Client::builder()
        .emulation(TlsProfile::Chrome124.emulation())
        .timeout(Duration::from_millis(timeout_ms.max(1000)));
    if let Some(proxy) = proxy {
        if let Ok(p) = rquest::Proxy::all(proxy.to_url()) {
            builder = builder.proxy(p);
        }
    }
    let client = builder.build().ok()?;

    let response = client
        .get(&cache_url)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Accept-Encoding", "gzip, deflate, br")
        .header("Sec-Fetch-Dest", "document")
        .header("Sec-Fetch-Mode", "navigate")
        .header("Sec-Fetch-Site", "same-origin")
        .header("Referer", "https://www.google.com/")
        .header("Upgrade-Insecure-Requests", "1")
        .send()
        .await
        .map_err(|e| debug!(url, error = %e, "web cache fetch failed"))
        .ok()?;

    let status = response.status().as_u16();
    if status >= 400 {
        return None;
    }

    let mut response_headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let html = response.text().await.ok()?;
    let html = strip_cache_banner(&html);

    if html.trim().len() < 500 || detector.is_blocked(&html) {
        return None;
    }

    response_headers.insert(
        "x-webharvest-source".to_string(),
        "google-cache".to_string(),
    );

    Some(FetchResult {
        raw_html: html,
        status_code: status,
        response_headers,
        source_tier: tier_names::WEB_CACHE.to_string(),
        best: false,
        ..FetchResult::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_banner_div() {
        let html = r#"<div id="google-cache-hdr"><span>cached copy</span></div><html><body>real</body></html>"#;
        let stripped = strip_cache_banner(html);
        assert!(!stripped.contains("cached copy"));
        assert!(stripped.contains("real"));
    }
}
