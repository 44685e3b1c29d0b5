//! Tier 5: Google-search referrer chain.
//!
//! Hard sites trust traffic that arrives the way humans do — through a
//! search. Navigate to Google, type a synthesized query with human
//! timing, click the result that points at the target domain, then land
//! on the exact page. Falls back to direct navigation whenever a phase
//! doesn't pan out.

use anyhow::Result;
use chromiumoxide::Page;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::schema::ScrapeRequest;

use super::browser_tier::{self, BrowserFetchOutput};
use super::humanize;

#[derive(Debug, Deserialize)]
struct AnchorBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Scroll the first result anchor matching the domain into view and
/// return its viewport box.
async fn locate_result_anchor(page: &Page, domain: &str) -> Option<AnchorBox> {
    let script = format!(
        r#"(() => {{
            const domain = {domain_json};
            const anchors = Array.from(document.querySelectorAll('#search a[href], a[href]'));
            for (const a of anchors.slice(0, 40)) {{
                const href = a.href || '';
                if (!href.includes(domain)) continue;
                a.scrollIntoView({{ block: 'center' }});
                const r = a.getBoundingClientRect();
                if (r.width > 0 && r.height > 0) {{
                    return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
                }}
            }}
            return null;
        }})()"#,
        domain_json = serde_json::to_string(domain).unwrap_or_else(|_| "\"\"".to_string()),
    );
    let result = page.evaluate(script).await.ok()?;
    result.into_value::<Option<AnchorBox>>().ok().flatten()
}

async fn search_and_click(page: &Page, target: &Url) -> Result<bool> {
    let domain = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_lowercase();

    browser_tier::goto_with_waits(page, "https://www.google.com/", None).await?;
    humanize::sleep_range(1000, 2000).await;
    humanize::try_accept_google_consent(page).await;

    // Focus the search box; bail to direct navigation when Google is
    // showing something unexpected.
    let search_input = match page.find_element("textarea[name='q'], input[name='q']").await {
        Ok(el) => el,
        Err(_) => {
            debug!("no search input found, referrer chain falls back to direct");
            return Ok(false);
        }
    };
    search_input.click().await?;

    let query = humanize::search_query_for(target);
    humanize::type_like_human(page, &query).await?;
    humanize::sleep_range(300, 700).await;
    page.press_key("Enter").await?;

    // Wait for the results page.
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(8),
        page.wait_for_navigation(),
    )
    .await;
    humanize::sleep_range(1000, 2000).await;

    let Some(anchor) = locate_result_anchor(page, &domain).await else {
        debug!(domain, "no matching result anchor, falling back to direct");
        return Ok(false);
    };

    humanize::sleep_range(300, 600).await;
    let target_x = anchor.x + anchor.width / 2.0;
    let target_y = anchor.y + anchor.height / 2.0;
    humanize::mouse_move_natural(page, target_x, target_y).await?;
    humanize::sleep_range(100, 300).await;
    humanize::mouse_click(page, target_x, target_y).await?;

    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(15),
        page.wait_for_navigation(),
    )
    .await;
    Ok(true)
}

/// Run the referrer chain on a configured stealth page.
pub async fn fetch(
    page: &Page,
    request: &ScrapeRequest,
    target: &Url,
) -> Result<BrowserFetchOutput> {
    let clicked = search_and_click(page, target).await.unwrap_or(false);

    humanize::sleep_range(1500, 3000).await;
    humanize::try_accept_cookies(page).await;

    let target_str = target.to_string();
    if clicked {
        // Landed somewhere on the domain; move to the exact target when
        // the click took us elsewhere.
        let current = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        if current != target_str {
            browser_tier::goto_with_waits(page, &target_str, None).await?;
            humanize::sleep_range(1000, 2000).await;
        }
        humanize::try_accept_cookies(page).await;

        if request.wait_for > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(request.wait_for.min(30_000)))
                .await;
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
        let status_code = if html.len() > 500 { 200 } else { 0 };
        Ok(BrowserFetchOutput {
            html,
            status_code,
            response_headers: Default::default(),
            screenshot,
            action_screenshots,
        })
    } else {
        // Whole chain fell through — plain stealth navigation.
        browser_tier::navigate_and_capture(page, request, &target_str, true).await
    }
}
