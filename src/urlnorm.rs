//! URL normalization for dedup and frontier membership.
//!
//! Fragments are dropped unless they look like SPA routes (`#/...` or
//! `#!/...`); tracking query parameters are stripped so the same page
//! reached through different campaigns dedups to one visit.

use url::Url;

/// Query parameters that never change page identity.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "gclid",
    "gclsrc",
    "dclid",
    "fbclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "igshid",
    "ref",
    "ref_src",
    "referrer",
    "_ga",
    "_gl",
    "spm",
];

/// Normalize a URL for dedup: resolve against `base` when relative, drop
/// non-SPA fragments, strip tracking query parameters, lowercase the host.
/// Idempotent: `normalize_url(normalize_url(u), None) == normalize_url(u, None)`.
#[must_use]
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let parsed = match base {
        Some(b) => b.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let mut out = parsed.clone();

    // SPA routes live in the fragment; everything else is an in-page anchor.
    let keep_fragment = parsed
        .fragment()
        .is_some_and(|f| f.starts_with('/') || f.starts_with("!/"));
    if !keep_fragment {
        out.set_fragment(None);
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        out.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &kept {
            serializer.append_pair(k, v);
        }
        out.set_query(Some(&serializer.finish()));
    }

    Some(out.to_string())
}

/// Resolve a possibly-relative URL against a base, keeping SPA fragments.
/// Returns `None` for mailto:/tel:/javascript:/data: and fragment-only refs.
#[must_use]
pub fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }
    // Fragment-only refs point back at the page itself unless they are SPA routes.
    if let Some(frag) = href.strip_prefix('#') {
        if !(frag.starts_with('/') || frag.starts_with("!/")) {
            return None;
        }
    }
    normalize_url(href, Some(base))
}

/// Registrable domain of a host (`sub.shop.example.co.uk` -> `example.co.uk`).
#[must_use]
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches("www.");
    psl::domain_str(host).unwrap_or(host).to_string()
}

/// Host of a URL with any `www.` prefix removed, lowercased.
#[must_use]
pub fn bare_host(url: &Url) -> String {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params() {
        let n = normalize_url(
            "https://example.com/page?utm_source=x&id=5&fbclid=abc",
            None,
        )
        .expect("valid");
        assert_eq!(n, "https://example.com/page?id=5");
    }

    #[test]
    fn drops_plain_fragment_keeps_spa_route() {
        let plain = normalize_url("https://example.com/docs#install", None).expect("valid");
        assert_eq!(plain, "https://example.com/docs");

        let spa = normalize_url("https://example.com/app#/settings/profile", None).expect("valid");
        assert_eq!(spa, "https://example.com/app#/settings/profile");

        let bang = normalize_url("https://example.com/app#!/inbox", None).expect("valid");
        assert_eq!(bang, "https://example.com/app#!/inbox");
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            "https://Example.com/Page?utm_source=a&q=1#frag",
            "https://example.com/app#/route?x=1",
            "https://example.com/?gclid=zzz",
        ];
        for case in cases {
            let once = normalize_url(case, None).expect("valid");
            let twice = normalize_url(&once, None).expect("valid");
            assert_eq!(once, twice, "not idempotent for {case}");
        }
    }

    #[test]
    fn resolve_skips_non_navigable() {
        let base = Url::parse("https://example.com/a/b").expect("valid");
        assert!(resolve_link("mailto:x@example.com", &base).is_none());
        assert!(resolve_link("javascript:void(0)", &base).is_none());
        assert!(resolve_link("#section", &base).is_none());
        assert_eq!(
            resolve_link("../c", &base).as_deref(),
            Some("https://example.com/c")
        );
    }

    #[test]
    fn registrable_domain_handles_multi_part_tlds() {
        assert_eq!(registrable_domain("shop.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("www.example.com"), "example.com");
    }
}
