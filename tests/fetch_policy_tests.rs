//! Fetch-layer policy: hard sites, header bundles, tier preconditions,
//! cache keys.

use webharvest::cache::scrape_cache_key;
use webharvest::fetch::{
    accept_language_for_url, is_hard_site, matches_bot_detection, profile_headers, tier_names,
    TlsProfile,
};
use webharvest::schema::ScrapeRequest;

#[test]
fn hard_site_matching_is_suffix_aware() {
    assert!(is_hard_site("https://www.amazon.in/dp/B0ABCDEF"));
    assert!(is_hard_site("https://music.amazon.co.uk/home"));
    assert!(is_hard_site("https://www.linkedin.com/in/someone"));
    assert!(!is_hard_site("https://amazonia-plants.example.com/"));
    assert!(!is_hard_site("https://docs.rs/"));
}

#[test]
fn browser_demand_short_circuits() {
    let mut request = ScrapeRequest::new("https://example.com/");
    assert!(!request.needs_browser());

    request.actions.push(webharvest::schema::Action {
        action_type: "click".to_string(),
        selector: Some("#expand".to_string()),
        text: None,
        key: None,
        value: None,
        script: None,
        milliseconds: None,
        direction: None,
        amount: None,
        fields: None,
    });
    assert!(request.needs_browser());
}

#[test]
fn tld_locale_mapping_longest_suffix_first() {
    assert_eq!(accept_language_for_url("https://amazon.com.au/x"), "en-AU,en;q=0.9");
    assert_eq!(accept_language_for_url("https://amazon.co.uk/x"), "en-GB,en;q=0.9");
    assert_eq!(accept_language_for_url("https://site.de/x"), "de-DE,de;q=0.9,en;q=0.8");
    assert_eq!(accept_language_for_url("https://site.dev/x"), "en-US,en;q=0.9");
}

#[test]
fn edge_profile_carries_edge_brand() {
    let headers = profile_headers(TlsProfile::Edge101, "https://example.com/");
    let ua_hint = headers
        .iter()
        .find(|(name, _)| name == "Sec-Ch-Ua")
        .expect("edge sends client hints");
    assert!(ua_hint.1.contains("Microsoft Edge"));
}

#[test]
fn bot_detection_vendor_urls() {
    assert!(matches_bot_detection("https://x.kasada.io/ips.js"));
    assert!(matches_bot_detection("https://www.recaptcha.net/recaptcha/api.js"));
    assert!(!matches_bot_detection("https://cdn.example.com/react.js"));
}

#[test]
fn tier_names_are_stable_identifiers() {
    // These strings land in FetchResult.source_tier and job metadata;
    // renames are wire-format breaks.
    assert_eq!(tier_names::TLS_IMPERSONATE, "tls-impersonate");
    assert_eq!(tier_names::HTTP2, "httpx");
    assert_eq!(tier_names::GOOGLE_CHAIN, "google-chain");
    assert_eq!(tier_names::ARCHIVE, "wayback-machine");
}

#[test]
fn cache_keys_distinguish_urls_not_format_order() {
    let one = scrape_cache_key("https://a.com/", &["links".into(), "markdown".into()]);
    let two = scrape_cache_key("https://a.com/", &["markdown".into(), "links".into()]);
    let other = scrape_cache_key("https://b.com/", &["markdown".into(), "links".into()]);
    assert_eq!(one, two);
    assert_ne!(one, other);
}
