//! Fetch tier adapters.
//!
//! Each tier exposes the same contract: given a URL, request options and
//! an optional proxy, produce a [`FetchResult`](crate::schema::FetchResult)
//! or nothing. Adapters never raise across the tier boundary and mutate no
//! state outside their own scope. The orchestrator in [`crate::scrape`]
//! runs them in the fixed cascade order.

pub mod archive;
pub mod hard_sites;
pub mod headers;
pub mod http2;
pub mod tls;
pub mod webcache;

pub use hard_sites::{is_hard_site, matches_bot_detection};
pub use headers::{TlsProfile, accept_language_for_url, profile_headers, random_header_bundle};

/// Tier labels recorded on `FetchResult::source_tier`.
pub mod tier_names {
    pub const TLS_IMPERSONATE: &str = "tls-impersonate";
    pub const HTTP2: &str = "httpx";
    pub const CHROMIUM: &str = "chromium-stealth";
    pub const FIREFOX: &str = "firefox-stealth";
    pub const GOOGLE_CHAIN: &str = "google-chain";
    pub const PREWARM: &str = "session-prewarm";
    pub const WEB_CACHE: &str = "google-cache";
    pub const ARCHIVE: &str = "wayback-machine";
}

