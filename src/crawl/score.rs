//! URL priority scoring.
//!
//! Content-rich pages (products, articles) crawl before navigation and
//! filter pages. Deterministic so the frontier ordering is reproducible.

use std::sync::LazyLock;

use regex::Regex;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-z0-9]+-[a-z0-9]+-[a-z0-9]+")
        .expect("SAFETY: hardcoded slug regex is statically valid")
});

static ALNUM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{6,}$").expect("SAFETY: hardcoded alnum-id regex is statically valid")
});

static NUMERIC_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4,}$").expect("SAFETY: hardcoded numeric-id regex is statically valid")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[/-]\d{2}").expect("SAFETY: hardcoded date regex is statically valid")
});

/// Score a URL for crawl priority. Higher scores pop first.
///
/// Additive heuristics:
///   +3  slug-like segment (word-word-word)  -> likely product/article
///   +2  alphanumeric ID segment (>=6 chars) -> likely product detail
///   +2  numeric ID segment (>=4 digits)     -> likely item page
///   +1  date fragment in the path           -> likely blog post
///   -1  per path segment beyond the second
///   -1  per query parameter
///   -2  per segment longer than 40 chars
/// Clamped to >= 0.
#[must_use]
pub fn score_url(url: &str) -> f64 {
    let Ok(parsed) = url::Url::parse(url) else {
        return 0.0;
    };
    let segments: Vec<&str> = parsed
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let mut score = 10.0_f64;

    for segment in &segments {
        if SLUG_RE.is_match(segment) {
            score += 3.0;
        }
        if ALNUM_ID_RE.is_match(segment) {
            score += 2.0;
        }
        if NUMERIC_ID_RE.is_match(segment) {
            score += 2.0;
        }
        if segment.len() > 40 {
            score -= 2.0;
        }
    }

    if DATE_RE.is_match(parsed.path()) {
        score += 1.0;
    }

    if segments.len() > 2 {
        score -= (segments.len() - 2) as f64;
    }

    if let Some(query) = parsed.query() {
        if !query.is_empty() {
            let params = query.matches('&').count() + 1;
            score -= params as f64;
        }
    }

    score.max(0.0)
}

/// The stored frontier score at a given depth: deeper URLs lose a point
/// per level.
#[must_use]
pub fn frontier_score(url: &str, depth: u32) -> f64 {
    score_url(url) - f64::from(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_scores_for_reference_urls() {
        // Slug segment: 10 + 3 - 1 (third segment) = 12
        assert_eq!(score_url("https://example.com/a/b/c-d-e"), 12.0);
        // Two query params: 10 - 2 = 8
        assert_eq!(score_url("https://example.com/?q=1&r=2"), 8.0);
        // Four segments: 10 - 2 = 8
        assert_eq!(score_url("https://example.com/deep/deep/deep/x"), 8.0);
        // Alnum ID: 10 + 2 = 12
        assert_eq!(score_url("https://example.com/p/BR12345678"), 12.0);
    }

    #[test]
    fn content_rich_urls_pop_before_navigation_urls() {
        // Slug and ID pages rank strictly above query/deep pages; ties
        // within a band fall to the store's internal ordering.
        let slug = score_url("https://example.com/a/b/c-d-e");
        let alnum = score_url("https://example.com/p/BR12345678");
        let query = score_url("https://example.com/?q=1&r=2");
        let deep = score_url("https://example.com/deep/deep/deep/x");
        assert!(slug > query && slug > deep);
        assert!(alnum > query && alnum > deep);
    }

    #[test]
    fn slug_segment_strictly_increases_score() {
        let without = score_url("https://example.com/docs/page");
        let with = score_url("https://example.com/docs/page/red-widget-sale");
        assert!(with > without);
    }

    #[test]
    fn query_param_strictly_decreases_score() {
        let without = score_url("https://example.com/list");
        let with = score_url("https://example.com/list?page=2");
        assert!(with < without);
    }

    #[test]
    fn date_fragment_bonus() {
        assert_eq!(score_url("https://example.com/blog/2024-05"), 11.0);
    }

    #[test]
    fn long_segment_penalty_and_clamp() {
        let long_seg = "x".repeat(45);
        let url = format!("https://example.com/a/b/c/d/e/f/g/h/i/j/k/{long_seg}");
        assert_eq!(score_url(&url), 0.0);
    }

    #[test]
    fn depth_discount() {
        let url = "https://example.com/p/BR12345678";
        assert_eq!(frontier_score(url, 0), 12.0);
        assert_eq!(frontier_score(url, 3), 9.0);
    }
}
