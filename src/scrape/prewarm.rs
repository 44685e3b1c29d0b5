//! Tier 6: advanced session pre-warming.
//!
//! The heaviest tier: build a Google session, search and click through to
//! the domain, browse a couple of internal pages with scrolls and
//! clicks, then navigate to the real target and wait out any remaining
//! challenge. Everything before the final navigation is best-effort —
//! the warm-up is worth whatever parts of it succeed.

use std::time::Duration;

use anyhow::Result;
use chromiumoxide::Page;
use rand::Rng;
use tracing::debug;
use url::Url;

use crate::detect::BlockDetector;
use crate::schema::ScrapeRequest;

use super::browser_tier::{self, BrowserFetchOutput};
use super::humanize;

/// Search term for the warm-up phase: the site name, with a country
/// word appended for country-coded domains.
fn warmup_search_term(target: &Url) -> String {
    let domain = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_lowercase();
    let parts: Vec<&str> = domain.split('.').collect();
    let site_name = parts.first().copied().unwrap_or_default();
    let mut name = String::new();
    let mut chars = site_name.chars();
    if let Some(first) = chars.next() {
        name.extend(first.to_uppercase());
        name.extend(chars);
    }

    if parts.len() > 2 {
        let country = match *parts.last().unwrap_or(&"") {
            "in" => "india",
            "uk" => "uk",
            "de" => "germany",
            "fr" => "france",
            "jp" => "japan",
            "ca" => "canada",
            "au" => "australia",
            "es" => "spain",
            "it" => "italy",
            other => other,
        };
        format!("{name} {country}")
    } else {
        name
    }
}

async fn google_session_phase(page: &Page) {
    if browser_tier::goto_with_waits(page, "https://www.google.com/", None)
        .await
        .is_err()
    {
        return;
    }
    humanize::sleep_range(1000, 2000).await;
    humanize::try_accept_google_consent(page).await;
    humanize::idle_mouse_wander(page, 2).await;
}

async fn search_clickthrough_phase(page: &Page, target: &Url) {
    let Ok(search_input) = page.find_element("textarea[name='q'], input[name='q']").await else {
        return;
    };
    if search_input.click().await.is_err() {
        return;
    }
    let term = warmup_search_term(target);
    if humanize::type_like_human(page, &term).await.is_err() {
        return;
    }
    humanize::sleep_range(300, 600).await;
    if page.press_key("Enter").await.is_err() {
        return;
    }
    let _ = tokio::time::timeout(Duration::from_secs(8), page.wait_for_navigation()).await;
    humanize::sleep_range(1000, 2000).await;

    let domain = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_lowercase();
    let script = format!(
        r#"(() => {{
            const domain = {domain_json};
            for (const a of Array.from(document.querySelectorAll('a[href]')).slice(0, 40)) {{
                if ((a.href || '').includes(domain)) {{
                    a.scrollIntoView({{ block: 'center' }});
                    const r = a.getBoundingClientRect();
                    return {{ x: r.x + r.width / 2, y: r.y + r.height / 2 }};
                }}
            }}
            return null;
        }})()"#,
        domain_json = serde_json::to_string(&domain).unwrap_or_else(|_| "\"\"".to_string()),
    );

    #[derive(serde::Deserialize)]
    struct Point {
        x: f64,
        y: f64,
    }
    let point: Option<Point> = match page.evaluate(script).await {
        Ok(result) => result.into_value().ok().flatten(),
        Err(_) => None,
    };
    if let Some(point) = point {
        humanize::sleep_range(300, 600).await;
        if humanize::mouse_move_natural(page, point.x, point.y).await.is_ok()
            && humanize::mouse_click(page, point.x, point.y).await.is_ok()
        {
            let _ = tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await;
        }
    }
}

async fn browse_naturally_phase(page: &Page, target: &Url) {
    let domain = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_lowercase();
    let current = page.url().await.ok().flatten().unwrap_or_default();
    if !current.contains(&domain) {
        return;
    }

    let hops = rand::rng().random_range(2..=3);
    for _ in 0..hops {
        humanize::idle_mouse_wander(page, 2).await;
        humanize::scroll_jitter(page).await;

        // Click a random internal link.
        let script = format!(
            r#"(() => {{
                const domain = {domain_json};
                const anchors = Array.from(document.querySelectorAll('a[href]'))
                    .filter(a => (a.href || '').includes(domain))
                    .slice(0, 10);
                if (!anchors.length) return null;
                const pick = anchors[Math.floor(Math.random() * anchors.length)];
                pick.scrollIntoView({{ block: 'center' }});
                const r = pick.getBoundingClientRect();
                return {{ x: r.x + r.width / 2, y: r.y + r.height / 2 }};
            }})()"#,
            domain_json = serde_json::to_string(&domain).unwrap_or_else(|_| "\"\"".to_string()),
        );

        #[derive(serde::Deserialize)]
        struct Point {
            x: f64,
            y: f64,
        }
        let point: Option<Point> = match page.evaluate(script).await {
            Ok(result) => result.into_value().ok().flatten(),
            Err(_) => None,
        };
        if let Some(point) = point {
            humanize::sleep_range(200, 400).await;
            if humanize::mouse_click(page, point.x, point.y).await.is_ok() {
                let _ =
                    tokio::time::timeout(Duration::from_secs(8), page.wait_for_navigation()).await;
            }
        }

        humanize::sleep_range(1000, 2000).await;
        humanize::try_accept_cookies(page).await;
    }
}

/// Run the full pre-warm sequence on a configured stealth page.
pub async fn fetch(
    page: &Page,
    request: &ScrapeRequest,
    target: &Url,
    detector: &BlockDetector,
) -> Result<BrowserFetchOutput> {
    google_session_phase(page).await;
    search_clickthrough_phase(page, target).await;
    humanize::sleep_range(1500, 3000).await;
    humanize::try_accept_cookies(page).await;
    browse_naturally_phase(page, target).await;

    // The actual target, with everything the warm-up earned.
    let target_str = target.to_string();
    let (status_code, response_headers) =
        browser_tier::goto_with_waits(page, &target_str, None).await?;
    humanize::idle_mouse_wander(page, 3).await;
    humanize::try_accept_cookies(page).await;

    // Re-check for a lingering challenge up to twice.
    for _ in 0..2 {
        let html = page.content().await.unwrap_or_default();
        if !detector.is_blocked(&html) {
            break;
        }
        debug!("challenge still present after pre-warm, waiting");
        humanize::sleep_range(3000, 5000).await;
    }

    if request.wait_for > 0 {
        tokio::time::sleep(Duration::from_millis(request.wait_for.min(30_000))).await;
    }
    let action_screenshots = if request.actions.is_empty() {
        Vec::new()
    } else {
        crate::browser::actions::execute_actions(page, &request.actions).await
    };
    let screenshot = if request.wants("screenshot") {
        crate::browser::actions::full_page_screenshot(page).await.ok()
    } else {
        None
    };

    let html = page.content().await?;
    Ok(BrowserFetchOutput {
        html,
        status_code,
        response_headers,
        screenshot,
        action_screenshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_term_for_country_domain() {
        let url = Url::parse("https://www.amazon.in/dp/B09V3KXJPB").expect("valid");
        assert_eq!(warmup_search_term(&url), "Amazon india");
    }

    #[test]
    fn warmup_term_for_plain_domain() {
        let url = Url::parse("https://www.zillow.com/homes/").expect("valid");
        assert_eq!(warmup_search_term(&url), "Zillow");
    }
}
