//! Request and artifact types for the scrape/crawl pipelines.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Output formats a scrape request can ask for.
pub const ALL_FORMATS: &[&str] = &[
    "markdown",
    "html",
    "raw_html",
    "links",
    "screenshot",
    "structured_data",
    "headings",
    "images",
];

/// A single-page scrape request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    /// Subset of [`ALL_FORMATS`]. Defaults to `["markdown"]`.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// Extract only the main content region instead of the full page.
    #[serde(default)]
    pub only_main_content: bool,
    /// Extra wait after load, in milliseconds (capped at 30s).
    #[serde(default)]
    pub wait_for: u64,
    /// Per-HTTP-tier timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    /// Scripted browser actions executed after load, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    /// CSS selectors to keep (applied after cleaning).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    /// CSS selectors to drop (applied after cleaning).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    #[serde(default)]
    pub use_proxy: bool,
    /// Extra request headers for the HTTP tiers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Cookies installed into the browser context before navigation.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cookies: HashMap<String, String>,
    /// Use a mobile viewport in browser tiers.
    #[serde(default)]
    pub mobile: bool,
}

fn default_formats() -> Vec<String> {
    vec!["markdown".to_string()]
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ScrapeRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            formats: default_formats(),
            only_main_content: false,
            wait_for: 0,
            timeout: default_timeout_ms(),
            actions: Vec::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            use_proxy: false,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            mobile: false,
        }
    }

    #[must_use]
    pub fn wants(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f == format)
    }

    /// True when the request can only be satisfied by a browser tier.
    #[must_use]
    pub fn needs_browser(&self) -> bool {
        !self.actions.is_empty() || self.wants("screenshot") || self.wait_for > 0
    }
}

/// One scripted browser action. Unknown action types are skipped; failures
/// are logged and do not abort the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// `fill_form` field map: selector -> value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, String>>,
}

/// Raw result of one fetch tier. `status_code == 0` denotes a transport
/// failure; `best == false` marks a high-water-mark fallback that did not
/// pass the block detector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResult {
    pub raw_html: String,
    pub status_code: u16,
    pub response_headers: HashMap<String, String>,
    pub source_tier: String,
    pub best: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_screenshots: Vec<String>,
}

/// Page metadata derived during extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub language: String,
    pub source_url: String,
    pub status_code: u16,
    pub word_count: usize,
    /// `ceil(word_count / 200) * 60`.
    pub reading_time_seconds: u64,
    pub content_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HashMap<String, String>>,
}

/// One entry in the heading outline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One parsed `srcset` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SrcsetEntry {
    pub url: String,
    pub descriptor: String,
}

/// One image discovered on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub src: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub srcset: Vec<SrcsetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

/// One link with its anchor context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkInfo {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nofollow: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_tab: bool,
}

/// Internal/external split of the page's links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkGroup {
    pub count: usize,
    pub links: Vec<LinkInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksDetail {
    pub total: usize,
    pub internal: LinkGroup,
    pub external: LinkGroup,
}

/// Structured/semantic data embedded in the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_ld: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub open_graph: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub twitter_card: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta_tags: HashMap<String, String>,
}

impl StructuredData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.json_ld.is_empty()
            && self.open_graph.is_empty()
            && self.twitter_card.is_empty()
            && self.meta_tags.is_empty()
    }
}

/// Output of the extraction pipeline. When extraction succeeded at least
/// one of `markdown`, `html`, `raw_html`, `links`, `screenshot` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_detail: Option<LinksDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_screenshots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headings: Option<Vec<Heading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageInfo>>,
    pub metadata: PageMetadata,
}

impl ScrapeArtifact {
    /// Empty artifact carrying only the source URL and a status code;
    /// returned when every tier failed with nothing to extract from.
    #[must_use]
    pub fn empty(url: &str, status_code: u16) -> Self {
        Self {
            metadata: PageMetadata {
                source_url: url.to_string(),
                status_code,
                ..PageMetadata::default()
            },
            ..Self::default()
        }
    }
}

/// Crawl configuration as consumed by the core. Immutable for the life of
/// a crawl; bounds are applied at engine init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Bounded to 1..=10 at init.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub allow_external_links: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub respect_robots_txt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_options: Option<ScrapeRequest>,
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    50
}

fn default_concurrency() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_browser_flags() {
        let mut req = ScrapeRequest::new("https://example.com");
        assert!(!req.needs_browser());
        req.wait_for = 2000;
        assert!(req.needs_browser());

        let mut req = ScrapeRequest::new("https://example.com");
        req.formats.push("screenshot".to_string());
        assert!(req.needs_browser());
    }

    #[test]
    fn artifact_empty_carries_url() {
        let a = ScrapeArtifact::empty("https://example.com/x", 0);
        assert_eq!(a.metadata.source_url, "https://example.com/x");
        assert_eq!(a.metadata.status_code, 0);
        assert!(a.markdown.is_none());
    }

    #[test]
    fn crawl_request_deserializes_with_defaults() {
        let req: CrawlRequest =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).expect("valid json");
        assert_eq!(req.max_depth, 3);
        assert_eq!(req.concurrency, 5);
        assert!(!req.respect_robots_txt);
    }
}
