//! Consumer-side content quality gate.
//!
//! Login walls, gated teasers and empty shells waste `max_pages` budget
//! and pollute results, but the links on them are still worth
//! harvesting. The gate classifies extracted Markdown; skipped pages
//! feed the frontier without counting as crawled.

/// Why a page was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Under the minimum word count.
    Empty,
    /// Short page dominated by auth prompts.
    LoginWall,
    /// Short page behind a paywall/membership gate.
    Gated,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::LoginWall => "login_wall",
            Self::Gated => "gated",
        }
    }
}

const MIN_WORDS: usize = 80;
const SHORT_PAGE_WORDS: usize = 800;

/// Auth-wall phrases; two or more on a short page marks a login wall.
const AUTH_PHRASES: &[&str] = &[
    "sign in",
    "log in",
    "sign up",
    "create account",
    "create an account",
    "register",
    "forgot password",
    "reset password",
];

/// Gated/empty-shell phrases; one is enough on a short page.
const GATED_PHRASES: &[&str] = &[
    "personalized recommendations",
    "recently viewed",
    "browsing history",
    "enable javascript",
    "javascript is required",
    "please enable cookies",
    "cookies are required",
    "access denied",
    "403 forbidden",
    "page not found",
    "404",
    "subscribe to continue",
    "subscribe to read",
    "this content is available to",
    "members only",
    "premium content",
];

/// Classify extracted Markdown. `None` means the page passes.
#[must_use]
pub fn evaluate(markdown: &str) -> Option<SkipReason> {
    let text = markdown.trim();
    let word_count = text.split_whitespace().count();

    if word_count < MIN_WORDS {
        return Some(SkipReason::Empty);
    }
    if word_count >= SHORT_PAGE_WORDS {
        return None;
    }

    let lower = text.to_lowercase();
    let auth_hits = AUTH_PHRASES.iter().filter(|p| lower.contains(**p)).count();
    if auth_hits >= 2 {
        return Some(SkipReason::LoginWall);
    }
    let gated_hits = GATED_PHRASES.iter().filter(|p| lower.contains(**p)).count();
    if gated_hits >= 1 {
        return Some(SkipReason::Gated);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_page_is_empty() {
        assert_eq!(evaluate("just a few words"), Some(SkipReason::Empty));
    }

    #[test]
    fn login_wall_needs_two_auth_phrases() {
        let filler = "word ".repeat(100);
        let one = format!("{filler} Sign in to your dashboard.");
        assert_eq!(evaluate(&one), None);

        let two = format!("{filler} Sign in here. Or create account to get started.");
        assert_eq!(evaluate(&two), Some(SkipReason::LoginWall));
    }

    #[test]
    fn single_gated_phrase_is_enough() {
        let filler = "word ".repeat(100);
        let gated = format!("{filler} Subscribe to continue reading this story.");
        assert_eq!(evaluate(&gated), Some(SkipReason::Gated));
    }

    #[test]
    fn long_pages_always_pass() {
        let long = "word ".repeat(900);
        let page = format!("{long} Sign in. Create account. Subscribe to continue.");
        assert_eq!(evaluate(&page), None);
    }

    #[test]
    fn normal_article_passes() {
        let article = "meaningful prose ".repeat(120);
        assert_eq!(evaluate(&article), None);
    }
}
