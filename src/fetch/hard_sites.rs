//! Hard-site matching and bot-detection script patterns.
//!
//! Hard sites run aggressive anti-bot stacks; the cascade skips the plain
//! HTTP/2 tier for them and unlocks the referrer-chain and pre-warm tiers.

use std::sync::LazyLock;

use regex::Regex;

/// Domains known for aggressive anti-bot. Matching is suffix-aware: the
/// bare domain or any subdomain of it counts.
pub const HARD_SITES: &[&str] = &[
    "amazon.com",
    "amazon.co.uk",
    "amazon.de",
    "amazon.fr",
    "amazon.co.jp",
    "amazon.in",
    "amazon.ca",
    "amazon.com.au",
    "amazon.es",
    "amazon.it",
    "google.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "zillow.com",
    "indeed.com",
    "glassdoor.com",
    "walmart.com",
    "target.com",
    "bestbuy.com",
    "ebay.com",
    "cloudflare.com",
    "netflix.com",
    "spotify.com",
    "ticketmaster.com",
    "stubhub.com",
    "nike.com",
    "adidas.com",
    "booking.com",
    "airbnb.com",
    "expedia.com",
    "craigslist.org",
    "yelp.com",
];

/// True when the URL's host is a hard site or a subdomain of one.
#[must_use]
pub fn is_hard_site(url: &str) -> bool {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    else {
        return false;
    };
    let host = host.trim_start_matches("www.");
    HARD_SITES
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// URL patterns of bot-detection vendor scripts. Requests matching these
/// are aborted by the browser-tier interceptor on hard sites.
static BOT_DETECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let patterns = [
        r"fls-na\.amazon\.",
        r"unagi\.amazon\.",
        r".*\.akstat\.io",
        r".*\.akamaized\.net",
        r"px-captcha",
        r".*\.perimeterx\.",
        r"js\.datadome\.co",
        r"api\.datadome\.co",
        r"challenges\.cloudflare\.com",
        r"cdn-cgi/challenge-platform",
        r".*\.kasada\.io",
        r".*\.shape\.ag",
        r"fingerprintjs",
        r"recaptcha",
    ];
    let combined = patterns
        .iter()
        .map(|p| format!("({p})"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){combined}"))
        .expect("SAFETY: hardcoded bot-detection pattern set is statically valid")
});

/// True when a request URL matches a known bot-detection vendor.
#[must_use]
pub fn matches_bot_detection(request_url: &str) -> bool {
    BOT_DETECTION_RE.is_match(request_url)
}

/// For hard sites, the homepage URL for warm-up navigation; `None` when
/// the target already is the homepage.
#[must_use]
pub fn homepage_for_warmup(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.path().trim_end_matches('/').is_empty() && parsed.query().is_none() {
        return None;
    }
    Some(format!(
        "{}://{}/",
        parsed.scheme(),
        parsed.host_str()?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_aware_hard_site_match() {
        assert!(is_hard_site("https://www.amazon.in/dp/B09V3KXJPB"));
        assert!(is_hard_site("https://smile.amazon.com/x"));
        assert!(is_hard_site("https://x.com/somebody"));
        assert!(!is_hard_site("https://notamazon.example.com/"));
        assert!(!is_hard_site("https://example.com/amazon.com"));
    }

    #[test]
    fn bot_detection_patterns() {
        assert!(matches_bot_detection(
            "https://client.perimeterx.net/main.min.js"
        ));
        assert!(matches_bot_detection("https://js.datadome.co/tags.js"));
        assert!(matches_bot_detection(
            "https://example.com/cdn-cgi/challenge-platform/h/b/orchestrate"
        ));
        assert!(!matches_bot_detection("https://example.com/app.js"));
    }

    #[test]
    fn warmup_homepage() {
        assert_eq!(
            homepage_for_warmup("https://www.amazon.in/dp/B09V3KXJPB").as_deref(),
            Some("https://www.amazon.in/")
        );
        assert!(homepage_for_warmup("https://www.amazon.in/").is_none());
    }
}
