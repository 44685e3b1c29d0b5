//! Tier 1: TLS-impersonating HTTP fetch, multi-profile.
//!
//! Rotating browser headers over a stock TLS stack fails on hard sites —
//! the JA3 handshake gives the client away. This tier impersonates real
//! browser handshakes, attempting a fixed ordered list of fingerprint
//! profiles and short-circuiting on the first result that passes the
//! block detector.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::detect::BlockDetector;
use crate::fetch::headers::{TLS_PROFILE_ORDER, profile_headers};
use crate::fetch::tier_names;
use crate::proxy::Proxy;
use crate::schema::FetchResult;

fn build_client(
    profile: crate::fetch::TlsProfile,
    timeout: Duration,
    proxy: Option<&Proxy>,
) -> Option<rquest::Client> {
    let mut builder = rquest::Client::builder()
        .emulation(profile.emulation())
        .cookie_store(true)
        .timeout(timeout)
        .cert_verification(false);

    if let Some(proxy) = proxy {
        match rquest::Proxy::all(proxy.to_url()) {
            Ok(p) => builder = builder.proxy(p),
            Err(e) => {
                debug!(proxy = %proxy.host, error = %e, "skipping unusable proxy");
            }
        }
    }

    match builder.build() {
        Ok(client) => Some(client),
        Err(e) => {
            debug!(profile = profile.name(), error = %e, "tls client build failed");
            None
        }
    }
}

/// Attempt every TLS profile in order; return the first unblocked result,
/// else the longest partial seen across profiles, else `None`.
pub async fn fetch(
    url: &str,
    timeout_ms: u64,
    extra_headers: &HashMap<String, String>,
    proxy: Option<&Proxy>,
    detector: &BlockDetector,
) -> Option<FetchResult> {
    let timeout = Duration::from_millis(timeout_ms.max(1000));
    let mut best: Option<FetchResult> = None;

    for profile in TLS_PROFILE_ORDER {
        let Some(client) = build_client(*profile, timeout, proxy) else {
            continue;
        };

        let mut request = client.get(url);
        for (name, value) in profile_headers(*profile, url) {
            request = request.header(name, value);
        }
        for (name, value) in extra_headers {
            request = request.header(name, value);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(profile = profile.name(), url, error = %e, "tls profile failed");
                continue;
            }
        };

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
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
                debug!(profile = profile.name(), url, error = %e, "tls body read failed");
                continue;
            }
        };

        if !html.is_empty() && status < 400 && !detector.is_blocked(&html) {
            debug!(profile = profile.name(), url, chars = html.len(), "tls profile succeeded");
            return Some(FetchResult {
                raw_html: html,
                status_code: status,
                response_headers: headers,
                source_tier: tier_names::TLS_IMPERSONATE.to_string(),
                best: true,
                ..FetchResult::default()
            });
        }

        let longer_than_best = best
            .as_ref()
            .map_or(!html.is_empty(), |b| html.len() > b.raw_html.len());
        if longer_than_best {
            best = Some(FetchResult {
                raw_html: html,
                status_code: status,
                response_headers: headers,
                source_tier: tier_names::TLS_IMPERSONATE.to_string(),
                best: false,
                ..FetchResult::default()
            });
        }
        debug!(profile = profile.name(), url, status, "tls profile blocked, trying next");
    }

    best
}
