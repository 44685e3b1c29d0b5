//! Tier 8: web-archive fallback, the last resort.
//!
//! Queries the archive.org availability API; when a snapshot exists it is
//! fetched through the `id_` raw-content path (which suppresses the
//! injected toolbar) and any residual toolbar markup is stripped.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::fetch::tier_names;
use crate::proxy::Proxy;
use crate::schema::FetchResult;

static TOOLBAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!-- BEGIN WAYBACK TOOLBAR INSERT -->.*?<!-- END WAYBACK TOOLBAR INSERT -->")
        .expect("SAFETY: hardcoded toolbar regex is statically valid")
});

static WOMBAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*(?:wombat|archive\.org)[^>]*>.*?</script>")
        .expect("SAFETY: hardcoded wombat regex is statically valid")
});

static ARCHIVE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:link|style)[^>]*(?:archive\.org|wayback)[^>]*(?:/>|>.*?</(?:link|style)>)")
        .expect("SAFETY: hardcoded archive-link regex is statically valid")
});

/// Remove the injected archive toolbar and replay scripts.
#[must_use]
pub fn strip_wayback_toolbar(html: &str) -> String {
    let html = TOOLBAR_RE.replace_all(html, "");
    let html = WOMBAT_RE.replace_all(&html, "");
    ARCHIVE_LINK_RE.replace_all(&html, "").into_owned()
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    #[serde(default)]
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
}

/// Rewrite a snapshot URL to the raw-content path: insert the `id_`
/// modifier after the timestamp so the archive serves the page without
/// its toolbar.
#[must_use]
pub fn raw_snapshot_url(snapshot_url: &str) -> String {
    if let Some((prefix, rest)) = snapshot_url.split_once("/web/") {
        if let Some(slash) = rest.find('/') {
            let (timestamp, tail) = rest.split_at(slash);
            if !timestamp.ends_with("id_") {
                return format!("{prefix}/web/{timestamp}id_{tail}");
            }
        }
    }
    snapshot_url.to_string()
}

/// Fetch the closest archived snapshot, or `None` when none exists.
pub async fn fetch(url: &str, timeout_ms: u64, proxy: Option<&Proxy>) -> Option<FetchResult> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_millis(timeout_ms.max(1000)));
    if let Some(proxy) = proxy {
        if let Ok(p) = reqwest::Proxy::all(proxy.to_url()) {
            builder = builder.proxy(p);
        }
    }
    let client = builder.build().ok()?;

    let api_url = format!(
        "https://archive.org/wayback/available?url={}&timestamp=20260219",
        urlencoding::encode(url)
    );
    let availability = client
        .get(&api_url)
        .send()
        .await
        .map_err(|e| debug!(url, error = %e, "archive availability query failed"))
        .ok()?;
    if availability.status().as_u16() != 200 {
        return None;
    }
    let availability: AvailabilityResponse = availability.json().await.ok()?;
    let closest = availability.archived_snapshots.closest?;
    if !closest.available {
        return None;
    }

    let snapshot_url = raw_snapshot_url(&closest.url);
    let response = client
        .get(&snapshot_url)
        .send()
        .await
        .map_err(|e| debug!(url, error = %e, "archive snapshot fetch failed"))
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
    if html.is_empty() {
        return None;
    }

    response_headers.insert(
        "x-webharvest-source".to_string(),
        "wayback-machine".to_string(),
    );

    Some(FetchResult {
        raw_html: strip_wayback_toolbar(&html),
        status_code: 200,
        response_headers,
        source_tier: tier_names::ARCHIVE.to_string(),
        best: false,
        ..FetchResult::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolbar_is_stripped() {
        let html = "before<!-- BEGIN WAYBACK TOOLBAR INSERT -->toolbar junk<!-- END WAYBACK TOOLBAR INSERT -->after";
        assert_eq!(strip_wayback_toolbar(html), "beforeafter");
    }

    #[test]
    fn wombat_scripts_are_stripped() {
        let html = r#"<script src="https://web.archive.org/static/js/wombat.js"></script><p>keep</p>"#;
        let stripped = strip_wayback_toolbar(html);
        assert!(!stripped.contains("wombat"));
        assert!(stripped.contains("keep"));
    }

    #[test]
    fn id_modifier_inserted_after_timestamp() {
        assert_eq!(
            raw_snapshot_url("https://web.archive.org/web/20240101000000/https://example.com/x"),
            "https://web.archive.org/web/20240101000000id_/https://example.com/x"
        );
        // Already raw — unchanged
        assert_eq!(
            raw_snapshot_url("https://web.archive.org/web/20240101000000id_/https://example.com/x"),
            "https://web.archive.org/web/20240101000000id_/https://example.com/x"
        );
    }
}
