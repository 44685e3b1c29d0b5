//! Browser header bundles and locale mapping for the HTTP tiers.

use rand::prelude::IndexedRandom;
use rquest_util::Emulation;

/// TLS fingerprint profiles attempted by tier 1, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProfile {
    Chrome124,
    Chrome120,
    Safari17,
    Safari15,
    Edge101,
}

/// Fixed attempt order: newest Chrome first, Safari, then Edge.
pub const TLS_PROFILE_ORDER: &[TlsProfile] = &[
    TlsProfile::Chrome124,
    TlsProfile::Chrome120,
    TlsProfile::Safari17,
    TlsProfile::Safari15,
    TlsProfile::Edge101,
];

impl TlsProfile {
    #[must_use]
    pub fn emulation(self) -> Emulation {
        match self {
            Self::Chrome124 => Emulation::Chrome124,
            Self::Chrome120 => Emulation::Chrome120,
            Self::Safari17 => Emulation::Safari17_0,
            Self::Safari15 => Emulation::Safari15_5,
            Self::Edge101 => Emulation::Edge101,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Chrome124 => "chrome124",
            Self::Chrome120 => "chrome120",
            Self::Safari17 => "safari17_0",
            Self::Safari15 => "safari15_5",
            Self::Edge101 => "edge101",
        }
    }

    #[must_use]
    fn sec_ch_ua(self) -> Option<String> {
        match self {
            Self::Chrome124 => Some(
                r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#.to_string(),
            ),
            Self::Chrome120 => Some(
                r#""Chromium";v="120", "Google Chrome";v="120", "Not-A.Brand";v="99""#.to_string(),
            ),
            // Safari does not send client hints
            Self::Safari17 | Self::Safari15 => None,
            Self::Edge101 => Some(
                r#""Chromium";v="101", "Microsoft Edge";v="101", "Not A;Brand";v="99""#.to_string(),
            ),
        }
    }
}

/// TLD suffix -> Accept-Language. Longest suffix wins so `.com.au`
/// matches before `.au`.
const LOCALE_MAP: &[(&str, &str)] = &[
    (".in", "en-IN,en;q=0.9,hi;q=0.8"),
    (".co.uk", "en-GB,en;q=0.9"),
    (".de", "de-DE,de;q=0.9,en;q=0.8"),
    (".fr", "fr-FR,fr;q=0.9,en;q=0.8"),
    (".co.jp", "ja-JP,ja;q=0.9,en;q=0.8"),
    (".es", "es-ES,es;q=0.9,en;q=0.8"),
    (".it", "it-IT,it;q=0.9,en;q=0.8"),
    (".com.au", "en-AU,en;q=0.9"),
    (".ca", "en-CA,en;q=0.9"),
];

const DEFAULT_LOCALE: &str = "en-US,en;q=0.9";

/// Locale-aware Accept-Language from the target's TLD.
#[must_use]
pub fn accept_language_for_url(url: &str) -> &'static str {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    else {
        return DEFAULT_LOCALE;
    };
    let mut entries: Vec<&(&str, &str)> = LOCALE_MAP.iter().collect();
    entries.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));
    for (suffix, locale) in entries {
        if host.ends_with(suffix) {
            return locale;
        }
    }
    DEFAULT_LOCALE
}

/// Header bundle consistent with a TLS profile: Sec-CH-UA for
/// Chromium-based profiles, none for Safari, Edge's own for Edge.
#[must_use]
pub fn profile_headers(profile: TlsProfile, url: &str) -> Vec<(String, String)> {
    let locale = accept_language_for_url(url);
    let mut headers: Vec<(String, String)> = vec![
        (
            "Accept".into(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8".into(),
        ),
        ("Accept-Language".into(), locale.into()),
        ("Accept-Encoding".into(), "gzip, deflate, br".into()),
        ("Sec-Fetch-Dest".into(), "document".into()),
        ("Sec-Fetch-Mode".into(), "navigate".into()),
        ("Sec-Fetch-Site".into(), "none".into()),
        ("Sec-Fetch-User".into(), "?1".into()),
        ("Upgrade-Insecure-Requests".into(), "1".into()),
        ("Cache-Control".into(), "max-age=0".into()),
    ];

    match profile {
        TlsProfile::Safari17 | TlsProfile::Safari15 => {
            headers.retain(|(name, _)| name != "Sec-Fetch-User");
            if let Some(accept) = headers.iter_mut().find(|(name, _)| name == "Accept") {
                accept.1 = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into();
            }
        }
        _ => {
            if let Some(ua) = profile.sec_ch_ua() {
                headers.push(("Sec-Ch-Ua".into(), ua));
                headers.push(("Sec-Ch-Ua-Mobile".into(), "?0".into()));
                headers.push(("Sec-Ch-Ua-Platform".into(), "\"Windows\"".into()));
            }
        }
    }

    headers
}

/// Rotation pool for the plain HTTP/2 tier: realistic full header sets for
/// Chrome/Firefox/Safari/Edge across Windows/macOS/Linux plus locale
/// variants. One is sampled per request.
pub const HEADER_ROTATION_POOL: &[&[(&str, &str)]] = &[
    // Chrome 123 on Windows
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="123", "Google Chrome";v="123", "Not:A-Brand";v="8""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Cache-Control", "max-age=0"),
    ],
    // Chrome 124 on macOS
    &[
        ("User-Agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"macOS\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    // Chrome 125 on Linux
    &[
        ("User-Agent", "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="125", "Google Chrome";v="125", "Not.A/Brand";v="24""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Linux\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    // Firefox 125 on Windows
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("DNT", "1"),
    ],
    // Firefox 126 on macOS
    &[
        ("User-Agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    // Safari 17.4 on macOS
    &[
        ("User-Agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
    ],
    // Edge 124 on Windows
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="124", "Microsoft Edge";v="124", "Not-A.Brand";v="99""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    // Chrome with en-IN locale
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-IN,en;q=0.9,hi;q=0.8"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    // Chrome arriving from a Google search
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "cross-site"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Referer", "https://www.google.com/"),
    ],
    // Chrome 124 on Windows, en-GB
    &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-GB,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Ch-Ua", r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
    ],
];

/// Sample one header bundle from the rotation pool.
#[must_use]
pub fn random_header_bundle() -> &'static [(&'static str, &'static str)] {
    let mut rng = rand::rng();
    HEADER_ROTATION_POOL
        .choose(&mut rng)
        .copied()
        .unwrap_or(HEADER_ROTATION_POOL[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_longest_suffix_wins() {
        assert_eq!(
            accept_language_for_url("https://shop.example.com.au/item"),
            "en-AU,en;q=0.9"
        );
        assert_eq!(
            accept_language_for_url("https://www.amazon.in/dp/B09V3KXJPB"),
            "en-IN,en;q=0.9,hi;q=0.8"
        );
        assert_eq!(accept_language_for_url("https://example.org/"), DEFAULT_LOCALE);
    }

    #[test]
    fn safari_profiles_omit_client_hints() {
        let headers = profile_headers(TlsProfile::Safari17, "https://example.com");
        assert!(!headers.iter().any(|(name, _)| name.starts_with("Sec-Ch-Ua")));
        assert!(!headers.iter().any(|(name, _)| name == "Sec-Fetch-User"));
    }

    #[test]
    fn chromium_profiles_carry_matching_version() {
        let headers = profile_headers(TlsProfile::Chrome120, "https://example.com");
        let ua = headers
            .iter()
            .find(|(name, _)| name == "Sec-Ch-Ua")
            .expect("chrome bundle has Sec-Ch-Ua");
        assert!(ua.1.contains("v=\"120\""));
    }

    #[test]
    fn rotation_pool_has_ten_bundles() {
        assert_eq!(HEADER_ROTATION_POOL.len(), 10);
        for bundle in HEADER_ROTATION_POOL {
            assert!(bundle.iter().any(|(name, _)| *name == "User-Agent"));
        }
    }
}
