//! Block detection: classify a fetched HTML payload as a usable page or
//! an anti-bot interstitial/challenge.
//!
//! `BlockDetector::is_blocked` is a pure function of the HTML — the
//! escalation loop relies on that to re-check candidates without side
//! effects.

use std::sync::LazyLock;

use regex::Regex;

/// Phrases that mark a short page as a block/challenge interstitial.
pub const BLOCK_PATTERNS: &[&str] = &[
    "javascript is disabled",
    "enable javascript",
    "requires javascript",
    "javascript is required",
    "please enable javascript",
    "you need to enable javascript",
    "this page requires javascript",
    "turn on javascript",
    "activate javascript",
    "captcha",
    "verify you are human",
    "verify you're human",
    "are you a robot",
    "not a robot",
    "bot detection",
    "access denied",
    "please verify",
    "unusual traffic",
    "automated access",
    "checking your browser",
    "just a moment",
    "attention required",
    "please wait while we verify",
    "ray id",
    "performance & security by cloudflare",
    "sucuri website firewall",
    "pardon our interruption",
    "press & hold",
    "blocked by",
    "we need to verify that you're not a robot",
    "sorry, we just need to make sure",
    "one more step",
    "please click here if you are not redirected",
    "if you are not redirected within",
    "having trouble accessing google",
];

/// Tighter list checked against the head of the raw HTML; catches
/// challenge pages even when the bulk of the payload is large. Generic
/// words like "captcha" are deliberately absent here.
const STRONG_HEAD_PATTERNS: &[&str] = &[
    "javascript is disabled",
    "enable javascript",
    "attention required",
    "just a moment",
    "checking your browser",
    "please wait while we verify",
    "verify you are human",
    "are you a robot",
    "not a robot",
    "please click here if you are not redirected",
    "having trouble accessing google",
];

/// Abandoned-session interstitial signals (short body with >= 2 of these).
const SESSION_INTERSTITIAL_PATTERNS: &[&str] =
    &["continue shopping", "conditions of use", "privacy notice"];

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<body[^>]*>(.*?)</body>")
        .expect("SAFETY: hardcoded body regex is statically valid")
});

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>")
        .expect("SAFETY: hardcoded script regex is statically valid")
});

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style>")
        .expect("SAFETY: hardcoded style regex is statically valid")
});

static NOSCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>")
        .expect("SAFETY: hardcoded noscript regex is statically valid")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]+>").expect("SAFETY: hardcoded tag regex is statically valid")
});

static WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("SAFETY: hardcoded ws regex is statically valid"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
        .expect("SAFETY: hardcoded title regex is statically valid")
});

/// Block detector with the compiled-in signature set plus any phrases
/// added through the configuration hook.
#[derive(Debug, Clone, Default)]
pub struct BlockDetector {
    extra_phrases: Vec<String>,
}

impl BlockDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration hook for site-specific signature additions.
    #[must_use]
    pub fn with_extra_phrases(phrases: Vec<String>) -> Self {
        Self {
            extra_phrases: phrases.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Classify an HTML payload. Pure function of the input.
    #[must_use]
    pub fn is_blocked(&self, html: &str) -> bool {
        if html.is_empty() {
            return true;
        }

        let body_html = BODY_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map_or(html, |m| m.as_str());

        // Strip script/style/noscript content before measuring visible text.
        let visible = SCRIPT_RE.replace_all(body_html, " ");
        let visible = STYLE_RE.replace_all(&visible, " ");
        let visible = NOSCRIPT_RE.replace_all(&visible, " ");
        let text = TAG_RE.replace_all(&visible, " ");
        let text = WS_RE.replace_all(text.trim(), " ").to_lowercase();

        // Pages with substantial visible text are never block pages.
        if text.len() > 5000 {
            return false;
        }

        if text.len() < 1500 {
            if BLOCK_PATTERNS.iter().any(|p| text.contains(p)) {
                return true;
            }
            if self.extra_phrases.iter().any(|p| text.contains(p.as_str())) {
                return true;
            }
        }

        // Strong signals anywhere in the head of the raw payload.
        let head: String = html.chars().take(5000).collect::<String>().to_lowercase();
        if STRONG_HEAD_PATTERNS.iter().any(|p| head.contains(p)) {
            return true;
        }

        // Near-empty shell that depends on JS.
        if text.len() < 300 && html.to_lowercase().contains("<noscript") {
            return true;
        }

        if text.len() < 500 {
            // Redirect interstitial left over from cache attempts.
            if let Some(title) = TITLE_RE.captures(html).and_then(|c| c.get(1)) {
                if title.as_str().to_lowercase().contains("google") {
                    return true;
                }
            }

            // Abandoned-session interstitial: short body with the storefront combo.
            let signals = SESSION_INTERSTITIAL_PATTERNS
                .iter()
                .filter(|p| text.contains(**p))
                .count();
            if signals >= 2 {
                return true;
            }
        }

        false
    }
}

/// Classifier-derived error code for the scrape API, inferred from the
/// HTML signals and HTTP status of the best available payload.
#[must_use]
pub fn classify_failure(html: &str, status_code: u16) -> &'static str {
    let lower: String = html.chars().take(5000).collect::<String>().to_lowercase();
    if lower.contains("captcha") || lower.contains("verify you are human") {
        return "ANTI_BOT_CHALLENGE";
    }
    if lower.contains("just a moment") || lower.contains("checking your browser") {
        return "ANTI_BOT_CHALLENGE";
    }
    match status_code {
        401 | 403 => "ACCESS_DENIED",
        404 => "NOT_FOUND",
        429 => "RATE_LIMITED",
        500..=599 => "UPSTREAM_ERROR",
        0 => "FETCH_FAILED",
        _ => "BLOCKED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_body(body: &str) -> String {
        format!("<html><head><title>t</title></head><body>{body}</body></html>")
    }

    #[test]
    fn long_text_is_never_blocked() {
        let body = "word ".repeat(2000);
        let html = page_with_body(&format!("<p>{body} captcha</p>"));
        assert!(!BlockDetector::new().is_blocked(&html));
    }

    #[test]
    fn short_page_with_block_phrase_is_blocked() {
        let html = page_with_body("<p>Please enable JavaScript to continue.</p>");
        assert!(BlockDetector::new().is_blocked(&html));
    }

    #[test]
    fn strong_head_signal_catches_large_challenge_pages() {
        // Bulk of the page is script payload; the visible text is small but
        // the head carries the challenge marker.
        let filler = "var x = 1;".repeat(3000);
        let html = format!(
            "<html><head><title>Just a moment...</title></head><body><script>{filler}</script><p>ok</p></body></html>"
        );
        assert!(BlockDetector::new().is_blocked(&html));
    }

    #[test]
    fn noscript_shell_is_blocked() {
        let html = "<html><body><noscript>need js</noscript><div id=app></div></body></html>";
        assert!(BlockDetector::new().is_blocked(html));
    }

    #[test]
    fn google_title_interstitial_is_blocked() {
        let html =
            "<html><head><title>Google</title></head><body><p>redirecting</p></body></html>";
        assert!(BlockDetector::new().is_blocked(html));
    }

    #[test]
    fn abandoned_session_interstitial_is_blocked() {
        let html = page_with_body(
            "<a>Continue shopping</a> <a>Conditions of Use</a> <a>Privacy Notice</a>",
        );
        assert!(BlockDetector::new().is_blocked(&html));
    }

    #[test]
    fn normal_article_is_not_blocked() {
        let body = format!("<article><p>{}</p></article>", "Interesting words here. ".repeat(120));
        assert!(!BlockDetector::new().is_blocked(&page_with_body(&body)));
    }

    #[test]
    fn detector_is_pure() {
        let html = page_with_body("<p>captcha</p>");
        let det = BlockDetector::new();
        let first = det.is_blocked(&html);
        let second = det.is_blocked(&html);
        assert_eq!(first, second);
    }

    #[test]
    fn extra_phrases_hook() {
        let html = page_with_body("<p>our custom wall says hold on there</p>");
        assert!(!BlockDetector::new().is_blocked(&html));
        let det = BlockDetector::with_extra_phrases(vec!["hold on there".to_string()]);
        assert!(det.is_blocked(&html));
    }

    #[test]
    fn failure_codes() {
        assert_eq!(classify_failure("", 403), "ACCESS_DENIED");
        assert_eq!(classify_failure("", 429), "RATE_LIMITED");
        assert_eq!(classify_failure("", 0), "FETCH_FAILED");
        assert_eq!(
            classify_failure("<title>Just a moment...</title>", 200),
            "ANTI_BOT_CHALLENGE"
        );
    }
}
