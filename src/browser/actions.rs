//! Scripted browser action surface.
//!
//! Actions run in order with a 5s default timeout each. Unknown action
//! types are skipped; failures are logged and never abort the sequence.
//! `screenshot` actions push base64 PNGs onto the returned list.

use std::time::Duration;

use base64::Engine;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use tracing::{debug, warn};

use crate::schema::Action;

const ACTION_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_WAIT_MS: u64 = 30_000;

async fn with_timeout<F, T>(fut: F, timeout: Duration) -> anyhow::Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("action timed out after {timeout:?}")),
    }
}

async fn click_selector(page: &Page, selector: &str) -> anyhow::Result<()> {
    let element = page.find_element(selector).await?;
    element.click().await?;
    Ok(())
}

async fn fill_selector(page: &Page, selector: &str, value: &str) -> anyhow::Result<()> {
    // Set the value directly and fire the input/change events frameworks
    // listen for.
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.focus();
            el.value = {val};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = serde_json::to_string(selector)?,
        val = serde_json::to_string(value)?,
    );
    page.evaluate(script).await?;
    Ok(())
}

async fn wait_for_selector(page: &Page, selector: &str, timeout_ms: u64) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow::anyhow!("selector {selector} never appeared"));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

async fn capture_png(page: &Page) -> anyhow::Result<String> {
    let params = CaptureScreenshotParams {
        format: Some(CaptureScreenshotFormat::Png),
        ..Default::default()
    };
    let bytes = page
        .screenshot(params)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to capture screenshot: {e}"))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

async fn run_one(page: &Page, action: &Action, screenshots: &mut Vec<String>) -> anyhow::Result<()> {
    match action.action_type.as_str() {
        "click" => {
            if let Some(selector) = &action.selector {
                with_timeout(click_selector(page, selector), ACTION_TIMEOUT).await?;
            }
        }
        "type" => {
            if let (Some(selector), Some(text)) = (&action.selector, &action.text) {
                with_timeout(
                    async {
                        let element = page.find_element(selector.as_str()).await?;
                        element.click().await?;
                        for ch in text.chars() {
                            page.type_str(ch.to_string()).await?;
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        Ok(())
                    },
                    Duration::from_secs(15),
                )
                .await?;
            }
        }
        "fill" => {
            if let (Some(selector), Some(text)) = (&action.selector, &action.text) {
                with_timeout(fill_selector(page, selector, text), ACTION_TIMEOUT).await?;
            }
        }
        "wait" => {
            let ms = action.milliseconds.unwrap_or(1000).min(MAX_WAIT_MS);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        "scroll" => {
            let amount = action.amount.unwrap_or(500);
            let delta = if action.direction.as_deref() == Some("up") {
                -amount
            } else {
                amount
            };
            page.evaluate(format!("window.scrollBy(0, {delta})")).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        "screenshot" => {
            screenshots.push(with_timeout(capture_png(page), Duration::from_secs(15)).await?);
        }
        "hover" => {
            if let Some(selector) = &action.selector {
                with_timeout(
                    async {
                        let element = page.find_element(selector.as_str()).await?;
                        element.hover().await?;
                        Ok(())
                    },
                    ACTION_TIMEOUT,
                )
                .await?;
            }
        }
        "press" => {
            if let Some(key) = &action.key {
                if let Some(selector) = &action.selector {
                    let element = page.find_element(selector.as_str()).await?;
                    element.click().await?;
                }
                page.press_key(key.as_str()).await?;
            }
        }
        "select" => {
            if let (Some(selector), Some(value)) = (&action.selector, &action.value) {
                let script = format!(
                    r#"(() => {{
                        const el = document.querySelector({sel});
                        if (!el) return false;
                        el.value = {val};
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        return true;
                    }})()"#,
                    sel = serde_json::to_string(selector)?,
                    val = serde_json::to_string(value)?,
                );
                page.evaluate(script).await?;
            }
        }
        "fill_form" => {
            if let Some(fields) = &action.fields {
                for (selector, value) in fields {
                    if let Err(e) =
                        with_timeout(fill_selector(page, selector, value), Duration::from_secs(3))
                            .await
                    {
                        debug!(selector, error = %e, "fill_form field failed");
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        "evaluate" => {
            if let Some(script) = &action.script {
                page.evaluate(script.as_str()).await?;
            }
        }
        "go_back" => {
            with_timeout(
                async {
                    page.evaluate("history.back()").await?;
                    page.wait_for_navigation().await?;
                    Ok(())
                },
                Duration::from_secs(10),
            )
            .await?;
        }
        "go_forward" => {
            with_timeout(
                async {
                    page.evaluate("history.forward()").await?;
                    page.wait_for_navigation().await?;
                    Ok(())
                },
                Duration::from_secs(10),
            )
            .await?;
        }
        "wait_for_selector" => {
            if let Some(selector) = &action.selector {
                let ms = action.milliseconds.unwrap_or(10_000).min(MAX_WAIT_MS);
                wait_for_selector(page, selector, ms).await?;
            }
        }
        "wait_for_navigation" => {
            let ms = action.milliseconds.unwrap_or(10_000).min(MAX_WAIT_MS);
            with_timeout(
                async {
                    page.wait_for_navigation().await?;
                    Ok(())
                },
                Duration::from_millis(ms),
            )
            .await?;
        }
        "focus" => {
            if let Some(selector) = &action.selector {
                with_timeout(
                    async {
                        let element = page.find_element(selector.as_str()).await?;
                        element.focus().await?;
                        Ok(())
                    },
                    ACTION_TIMEOUT,
                )
                .await?;
            }
        }
        "clear" => {
            if let Some(selector) = &action.selector {
                with_timeout(fill_selector(page, selector, ""), ACTION_TIMEOUT).await?;
            }
        }
        unknown => {
            debug!(action = unknown, "skipping unknown action type");
        }
    }
    Ok(())
}

/// Execute a sequence of actions on a page. Returns base64 screenshots
/// captured by `screenshot` actions, in order.
pub async fn execute_actions(page: &Page, actions: &[Action]) -> Vec<String> {
    let mut screenshots = Vec::new();
    for action in actions {
        if let Err(e) = run_one(page, action, &mut screenshots).await {
            warn!(action = %action.action_type, error = %e, "action failed, continuing");
        }
    }
    screenshots
}

/// Full-page screenshot as base64 PNG.
pub async fn full_page_screenshot(page: &Page) -> anyhow::Result<String> {
    let params = CaptureScreenshotParams {
        format: Some(CaptureScreenshotFormat::Png),
        capture_beyond_viewport: Some(true),
        ..Default::default()
    };
    let bytes = page
        .screenshot(params)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to capture screenshot: {e}"))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
