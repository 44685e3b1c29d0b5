//! Tier 2: plain HTTP/2 fetch with rotating browser headers.
//!
//! Only used for sites not on the hard-sites list — a stock TLS handshake
//! with browser headers is enough for everything without JA3 checks.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::fetch::headers::random_header_bundle;
use crate::fetch::tier_names;
use crate::proxy::Proxy;
use crate::schema::FetchResult;

/// One fetch with a randomly sampled header bundle. Follows redirects.
pub async fn fetch(
    url: &str,
    timeout_ms: u64,
    extra_headers: &HashMap<String, String>,
    proxy: Option<&Proxy>,
) -> Option<FetchResult> {
    let mut headers = HeaderMap::new();
    for (name, value) in random_header_bundle() {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(n, v);
        }
    }
    for (name, value) in extra_headers {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(n, v);
        }
    }

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_millis(timeout_ms.max(1000)))
        .danger_accept_invalid_certs(true);

    if let Some(proxy) = proxy {
        match reqwest::Proxy::all(proxy.to_url()) {
            Ok(p) => builder = builder.proxy(p),
            Err(e) => debug!(proxy = %proxy.host, error = %e, "skipping unusable proxy"),
        }
    }

    let client = match builder.build() {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "http2 client build failed");
            return None;
        }
    };

    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!(url, error = %e, "http2 fetch failed");
            return None;
        }
    };

    let status = response.status().as_u16();
    let response_headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let html = match response.text().await {
        Ok(t) => t,
        Err(e) => {
            debug!(url, error = %e, "http2 body read failed");
            return None;
        }
    };

    Some(FetchResult {
        raw_html: html,
        status_code: status,
        response_headers,
        source_tier: tier_names::HTTP2.to_string(),
        best: false,
        ..FetchResult::default()
    })
}
