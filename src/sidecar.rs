//! Stealth-engine sidecar client.
//!
//! When `STEALTH_ENGINE_URL` is configured, browser tiers prefer the
//! sidecar: it runs patched browser builds (including Firefox, which the
//! local CDP pool cannot drive) behind a simple POST protocol and returns
//! rendered HTML, screenshots and discovery results.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::fingerprint::BrowserEngine;
use crate::fetch::tier_names;
use crate::proxy::Proxy;
use crate::schema::{Action, FetchResult, ScrapeRequest};

#[derive(Debug, Serialize)]
struct SidecarRequest<'a> {
    url: &'a str,
    timeout: u64,
    wait_after_load: u64,
    use_firefox: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookies: Option<&'a HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actions: Option<&'a [Action]>,
    screenshot: bool,
    mobile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<SidecarProxy>,
    discover_links: bool,
}

#[derive(Debug, Serialize)]
struct SidecarProxy {
    server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SidecarResponse {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub action_screenshots: Vec<String>,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub discovered_links: Vec<String>,
    #[serde(default)]
    pub doc_framework: Option<String>,
}

/// Client for one sidecar endpoint.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    base_url: String,
    client: reqwest::Client,
}

impl SidecarClient {
    #[must_use]
    pub fn new(base_url: &str) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(150))
            .build()
            .ok()?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post(&self, body: &SidecarRequest<'_>) -> Option<SidecarResponse> {
        let url = format!("{}/scrape", self.base_url);
        let response = match self.client.post(&url).json(body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "sidecar request failed");
                return None;
            }
        };
        match response.json::<SidecarResponse>().await {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %e, "sidecar returned unparseable response");
                None
            }
        }
    }

    /// Fetch through a sidecar browser context. The sidecar runs patched
    /// browser builds and applies its own stealth layer, including the
    /// Firefox engine the local pool cannot drive.
    pub async fn fetch(
        &self,
        request: &ScrapeRequest,
        engine: BrowserEngine,
        proxy: Option<&Proxy>,
    ) -> Option<FetchResult> {
        let body = SidecarRequest {
            url: &request.url,
            timeout: request.timeout.max(15_000),
            wait_after_load: request.wait_for.min(30_000),
            use_firefox: engine == BrowserEngine::Firefox,
            headers: (!request.headers.is_empty()).then_some(&request.headers),
            cookies: (!request.cookies.is_empty()).then_some(&request.cookies),
            actions: (!request.actions.is_empty()).then_some(&request.actions),
            screenshot: request.wants("screenshot"),
            mobile: request.mobile,
            proxy: proxy.map(|p| SidecarProxy {
                server: format!("{}://{}:{}", p.scheme, p.host, p.port),
                username: p.username.clone(),
                password: p.password.clone(),
            }),
            discover_links: false,
        };

        let response = self.post(&body).await?;
        if !response.success {
            debug!(error = ?response.error, "sidecar fetch reported failure");
        }
        if response.html.is_empty() {
            return None;
        }

        let tier = match engine {
            BrowserEngine::Chromium => tier_names::CHROMIUM,
            BrowserEngine::Firefox => tier_names::FIREFOX,
        };
        Some(FetchResult {
            raw_html: response.html,
            status_code: response.status_code,
            response_headers: response.response_headers,
            source_tier: tier.to_string(),
            best: false,
            screenshot: response.screenshot,
            action_screenshots: response.action_screenshots,
        })
    }

    /// One-shot deep nav discovery through the sidecar.
    pub async fn discover(&self, url: &str) -> Option<(Vec<String>, Option<String>)> {
        let body = SidecarRequest {
            url,
            timeout: 30_000,
            wait_after_load: 0,
            use_firefox: false,
            headers: None,
            cookies: None,
            actions: None,
            screenshot: false,
            mobile: false,
            proxy: None,
            discover_links: true,
        };
        let response = self.post(&body).await?;
        if response.discovered_links.is_empty() {
            return None;
        }
        Some((response.discovered_links, response.doc_framework))
    }
}
