//! Human-behavior primitives shared by the referrer-chain and pre-warm
//! tiers: jittered typing, natural mouse paths, scrolling and
//! cookie-consent acceptance.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use rand::Rng;
use tracing::debug;

/// Cookie-consent buttons worth a best-effort click, most specific first.
const COOKIE_ACCEPT_SELECTORS: &[&str] = &[
    "#sp-cc-accept",
    "[data-action-type='DISMISS']",
    "#onetrust-accept-btn-handler",
    "#cookie-consent-accept",
    "[aria-label*='Accept']",
];

/// Google GDPR/consent buttons.
const GOOGLE_CONSENT_SELECTORS: &[&str] = &["#L2AGLb", "button[aria-label='Accept all']"];

pub async fn sleep_range(min_ms: u64, max_ms: u64) {
    let ms = rand::rng().random_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Best-effort click on a cookie-consent button. Fails silently.
pub async fn try_accept_cookies(page: &Page) {
    for selector in COOKIE_ACCEPT_SELECTORS {
        if let Ok(element) = page.find_element(*selector).await {
            if element.click().await.is_ok() {
                debug!(selector, "accepted cookie consent");
                sleep_range(300, 600).await;
                return;
            }
        }
    }
}

/// Best-effort click on the Google GDPR consent dialog.
pub async fn try_accept_google_consent(page: &Page) {
    for selector in GOOGLE_CONSENT_SELECTORS {
        if let Ok(element) = page.find_element(*selector).await {
            if element.click().await.is_ok() {
                debug!(selector, "accepted google consent");
                sleep_range(500, 1000).await;
                return;
            }
        }
    }
    // Text-matched fallback for consent dialogs without stable ids.
    let _ = page
        .evaluate(
            r#"(() => {
                const labels = ['accept all', 'i agree', 'accept'];
                for (const btn of document.querySelectorAll('button')) {
                    const text = (btn.innerText || '').trim().toLowerCase();
                    if (labels.includes(text)) { btn.click(); return true; }
                }
                return false;
            })()"#,
        )
        .await;
}

async fn dispatch_mouse(page: &Page, params: DispatchMouseEventParams) -> anyhow::Result<()> {
    page.execute(params).await?;
    Ok(())
}

/// Move the mouse to a point along a jittered multi-step path.
pub async fn mouse_move_natural(page: &Page, to_x: f64, to_y: f64) -> anyhow::Result<()> {
    let (steps, from_x, from_y) = {
        let mut rng = rand::rng();
        (
            rng.random_range(8..=15),
            rng.random_range(100.0..400.0),
            rng.random_range(100.0..400.0),
        )
    };
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let (jx, jy) = {
            let mut rng = rand::rng();
            (rng.random_range(-3.0..3.0), rng.random_range(-3.0..3.0))
        };
        let x = from_x + (to_x - from_x) * t + jx;
        let y = from_y + (to_y - from_y) * t + jy;
        dispatch_mouse(
            page,
            DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseMoved)
                .x(x)
                .y(y)
                .build()
                .map_err(|e| anyhow::anyhow!("mouse event build failed: {e}"))?,
        )
        .await?;
        sleep_range(8, 25).await;
    }
    Ok(())
}

/// Click at a point with a short press.
pub async fn mouse_click(page: &Page, x: f64, y: f64) -> anyhow::Result<()> {
    dispatch_mouse(
        page,
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| anyhow::anyhow!("mouse event build failed: {e}"))?,
    )
    .await?;
    sleep_range(40, 120).await;
    dispatch_mouse(
        page,
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| anyhow::anyhow!("mouse event build failed: {e}"))?,
    )
    .await?;
    Ok(())
}

/// Wander the mouse around the viewport a few times.
pub async fn idle_mouse_wander(page: &Page, moves: u32) {
    for _ in 0..moves {
        let (x, y) = {
            let mut rng = rand::rng();
            (rng.random_range(200.0..1600.0), rng.random_range(100.0..800.0))
        };
        if mouse_move_natural(page, x, y).await.is_err() {
            return;
        }
        sleep_range(200, 500).await;
    }
}

/// Scroll down by a random amount.
pub async fn scroll_jitter(page: &Page) {
    let amount = rand::rng().random_range(200..500);
    let _ = page.evaluate(format!("window.scrollBy(0, {amount})")).await;
    sleep_range(500, 1000).await;
}

/// Type a query character-by-character with human inter-key delays and
/// occasional pauses.
pub async fn type_like_human(page: &Page, text: &str) -> anyhow::Result<()> {
    for ch in text.chars() {
        page.type_str(ch.to_string()).await?;
        sleep_range(50, 150).await;
        if rand::rng().random_bool(0.1) {
            sleep_range(200, 500).await;
        }
    }
    Ok(())
}

/// Synthesized search query for a target: `site:domain` plus the
/// de-hyphenated last path segment when one exists.
#[must_use]
pub fn search_query_for(url: &url::Url) -> String {
    let domain = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_lowercase();
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .replace(['-', '_'], " ");
    if last_segment.trim().is_empty() {
        domain
    } else {
        format!("site:{domain} {}", last_segment.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_from_slug_path() {
        let url = url::Url::parse("https://www.example.in/widgets/red-large-widget").expect("valid");
        assert_eq!(search_query_for(&url), "site:example.in red large widget");
    }

    #[test]
    fn query_for_homepage_is_bare_domain() {
        let url = url::Url::parse("https://www.example.com/").expect("valid");
        assert_eq!(search_query_for(&url), "example.com");
    }
}
