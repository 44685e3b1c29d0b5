//! Stealth browser pool.
//!
//! One long-lived Chromium instance serves every local browser-tier
//! request; per-request "contexts" are fresh pages with their own
//! fingerprint bundle, stealth init scripts, request interception and
//! cookie restore. Firefox contexts are served through the stealth
//! sidecar (chromiumoxide speaks CDP only), see [`crate::sidecar`].

pub mod actions;
pub mod challenge;
pub mod cookies;
pub mod discovery;
pub mod fingerprint;
pub mod intercept;
pub mod session;
pub mod stealth;

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetCookiesParams, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ScrapeError, is_browser_closed_error};
use crate::schema::ScrapeRequest;
use cookies::CookieJar;
use fingerprint::{BrowserEngine, Fingerprint};
use intercept::InterceptPolicy;

/// How long a caller waits for a pool slot before failing with CAPACITY.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Find a Chrome/Chromium executable: `CHROMIUM_PATH` override first,
/// then well-known install paths, then `which`.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to a non-existent file: {}", path.display());
    }

    let paths: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path in paths {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("found browser at {}", path.display());
            return Ok(path);
        }
    }

    for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
        if let Ok(output) = Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("found browser via which: {path}");
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!("no Chrome/Chromium executable found"))
}

struct BrowserHandle {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl BrowserHandle {
    async fn launch(headless: bool) -> Result<Self> {
        let chrome_path = find_browser_executable()?;
        let user_data_dir = std::env::temp_dir().join(format!(
            "webharvest_chrome_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&user_data_dir).context("failed to create user data dir")?;

        let mut config_builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(user_data_dir.clone())
            .chrome_executable(chrome_path);

        if headless {
            config_builder = config_builder.headless_mode(HeadlessMode::default());
        } else {
            config_builder = config_builder.with_head();
        }

        config_builder = config_builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--ignore-certificate-errors")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-breakpad")
            .arg("--disable-hang-monitor")
            .arg("--disable-ipc-flooding-protection")
            .arg("--disable-prompt-on-repost")
            .arg("--metrics-recording-only")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide doesn't model;
                    // those deserialize errors are noise, not faults.
                    let benign = msg.contains("data did not match any variant")
                        || msg.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("suppressed benign CDP error: {msg}");
                    } else {
                        error!("browser handler error: {msg}");
                    }
                }
            }
            debug!("browser handler task completed");
        });

        info!("stealth browser launched");
        Ok(Self {
            browser,
            handler_task,
            user_data_dir,
        })
    }

    async fn is_alive(&self) -> bool {
        self.browser.version().await.is_ok()
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("failed to remove user data dir: {e}");
        }
    }
}

/// Pool of stealth browser contexts: a shared Chromium instance plus
/// slot accounting for Chromium and (sidecar-served) Firefox contexts.
pub struct StealthBrowserPool {
    headless: bool,
    chromium: Mutex<Option<BrowserHandle>>,
    chromium_slots: Arc<Semaphore>,
    firefox_slots: Arc<Semaphore>,
    cookie_jar: Arc<CookieJar>,
}

impl StealthBrowserPool {
    #[must_use]
    pub fn new(chromium_pool_size: usize, firefox_pool_size: usize, headless: bool) -> Arc<Self> {
        Arc::new(Self {
            headless,
            chromium: Mutex::new(None),
            chromium_slots: Arc::new(Semaphore::new(chromium_pool_size.max(1))),
            firefox_slots: Arc::new(Semaphore::new(firefox_pool_size.max(1))),
            cookie_jar: Arc::new(CookieJar::new()),
        })
    }

    #[must_use]
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        Arc::clone(&self.cookie_jar)
    }

    /// Acquire a Firefox slot (the sidecar enforces its own concurrency
    /// too; this keeps local accounting symmetrical with Chromium).
    pub async fn acquire_firefox_slot(&self) -> Result<OwnedSemaphorePermit, ScrapeError> {
        tokio::time::timeout(
            ACQUIRE_TIMEOUT,
            Arc::clone(&self.firefox_slots).acquire_owned(),
        )
        .await
        .map_err(|_| ScrapeError::AtCapacity)?
        .map_err(|_| ScrapeError::AtCapacity)
    }

    /// Ensure the shared browser is running, relaunching under the init
    /// lock when the process died. A failed relaunch triggers one full
    /// re-init attempt.
    async fn ensure_browser(&self) -> Result<(), ScrapeError> {
        let mut guard = self.chromium.lock().await;

        if let Some(handle) = guard.as_ref() {
            if handle.is_alive().await {
                return Ok(());
            }
            warn!("stealth browser is no longer connected, relaunching");
            if let Some(dead) = guard.take() {
                dead.handler_task.abort();
                let _ = std::fs::remove_dir_all(&dead.user_data_dir);
            }
        }

        match BrowserHandle::launch(self.headless).await {
            Ok(handle) => {
                *guard = Some(handle);
                Ok(())
            }
            Err(first) => {
                warn!("browser relaunch failed ({first:#}), attempting full re-init");
                tokio::time::sleep(Duration::from_millis(500)).await;
                match BrowserHandle::launch(self.headless).await {
                    Ok(handle) => {
                        *guard = Some(handle);
                        Ok(())
                    }
                    Err(second) => Err(ScrapeError::Browser(format!("{second:#}"))),
                }
            }
        }
    }

    async fn new_raw_page(&self) -> Result<Page, ScrapeError> {
        self.ensure_browser().await?;

        let first_attempt = {
            let guard = self.chromium.lock().await;
            let handle = guard
                .as_ref()
                .ok_or_else(|| ScrapeError::Browser("browser not initialized".into()))?;
            handle.browser.new_page("about:blank").await
        };

        match first_attempt {
            Ok(page) => Ok(page),
            Err(e) if is_browser_closed_error(&e.to_string()) => {
                // The browser died between the health check and page
                // creation; one relaunch-and-retry.
                warn!("page creation hit a closed browser, retrying after relaunch");
                self.ensure_browser().await?;
                let guard = self.chromium.lock().await;
                let handle = guard
                    .as_ref()
                    .ok_or_else(|| ScrapeError::Browser("browser not initialized".into()))?;
                handle
                    .browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| ScrapeError::Browser(e.to_string()))
            }
            Err(e) => Err(ScrapeError::Browser(e.to_string())),
        }
    }

    /// Mint a stealth context: fresh fingerprint, CDP overrides, stealth
    /// init scripts, request interception, cookie restore, one open page.
    pub async fn get_page(
        self: &Arc<Self>,
        request: &ScrapeRequest,
        target_url: Option<&str>,
        policy: InterceptPolicy,
    ) -> Result<StealthPage, ScrapeError> {
        let permit = tokio::time::timeout(
            ACQUIRE_TIMEOUT,
            Arc::clone(&self.chromium_slots).acquire_owned(),
        )
        .await
        .map_err(|_| ScrapeError::AtCapacity)?
        .map_err(|_| ScrapeError::AtCapacity)?;

        let fingerprint = Fingerprint::sample(BrowserEngine::Chromium, request.mobile);
        let page = self.new_raw_page().await?;

        if let Err(e) = configure_page(&page, &fingerprint, request, target_url, policy, &self.cookie_jar).await
        {
            // Context setup failed; close the raw page before surfacing.
            let _ = page.close().await;
            return Err(ScrapeError::Browser(format!("{e:#}")));
        }

        Ok(StealthPage {
            page: Some(page),
            fingerprint,
            cookie_jar: Arc::clone(&self.cookie_jar),
            _permit: permit,
        })
    }

    /// Shut the pool down, closing the shared browser.
    pub async fn shutdown(&self) {
        let mut guard = self.chromium.lock().await;
        if let Some(handle) = guard.take() {
            handle.shutdown().await;
        }
        info!("stealth browser pool shut down");
    }
}

async fn configure_page(
    page: &Page,
    fingerprint: &Fingerprint,
    request: &ScrapeRequest,
    target_url: Option<&str>,
    policy: InterceptPolicy,
    jar: &CookieJar,
) -> Result<()> {
    // UA + platform + language must agree with the fingerprint bundle.
    page.execute(SetUserAgentOverrideParams {
        user_agent: fingerprint.user_agent.clone(),
        accept_language: Some(format!("{},en;q=0.9", fingerprint.locale)),
        platform: Some(fingerprint.navigator_platform().to_string()),
        user_agent_metadata: None,
    })
    .await
    .context("failed to override user agent")?;

    page.execute(SetTimezoneOverrideParams {
        timezone_id: fingerprint.timezone.clone(),
    })
    .await
    .context("failed to override timezone")?;

    // Client-hint headers consistent with the UA, plus any request-supplied
    // headers.
    let mut extra = serde_json::Map::new();
    for (name, value) in fingerprint.headers() {
        extra.insert(name, serde_json::Value::String(value));
    }
    for (name, value) in &request.headers {
        extra.insert(name.clone(), serde_json::Value::String(value.clone()));
    }
    if !extra.is_empty() {
        page.execute(SetExtraHttpHeadersParams {
            headers: Headers::new(serde_json::Value::Object(extra)),
        })
        .await
        .context("failed to set extra headers")?;
    }

    page.execute(
        SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(fingerprint.viewport.0))
            .height(i64::from(fingerprint.viewport.1))
            .device_scale_factor(1.0)
            .mobile(request.mobile)
            .build()
            .map_err(|e| anyhow::anyhow!("device metrics build failed: {e}"))?,
    )
    .await
    .context("failed to override device metrics")?;

    // Config object first, then the patch script, so every patch sees the
    // bundle values.
    page.execute(AddScriptToEvaluateOnNewDocumentParams {
        source: stealth::profile_config_script(fingerprint),
        include_command_line_api: None,
        world_name: None,
        run_immediately: None,
    })
    .await
    .context("failed to inject profile config")?;

    page.execute(AddScriptToEvaluateOnNewDocumentParams {
        source: stealth::CHROMIUM_STEALTH_JS.to_string(),
        include_command_line_api: None,
        world_name: None,
        run_immediately: None,
    })
    .await
    .context("failed to inject stealth script")?;

    intercept::install(page, policy)
        .await
        .context("failed to install request interception")?;

    // Restore jar cookies for the target domain, then request-supplied ones.
    let mut params = Vec::new();
    if let Some(target) = target_url {
        for stored in jar.cookies_for(target) {
            if let Some(param) = stored.to_param() {
                params.push(param);
            }
        }
        if !request.cookies.is_empty() {
            if let Ok(parsed) = url::Url::parse(target) {
                if let Some(host) = parsed.host_str() {
                    for (name, value) in &request.cookies {
                        if let Ok(param) =
                            chromiumoxide::cdp::browser_protocol::network::CookieParam::builder()
                                .name(name.clone())
                                .value(value.clone())
                                .domain(host.to_string())
                                .path("/".to_string())
                                .build()
                        {
                            params.push(param);
                        }
                    }
                }
            }
        }
    }
    if !params.is_empty() {
        page.execute(SetCookiesParams { cookies: params })
            .await
            .context("failed to restore cookies")?;
    }

    Ok(())
}

/// One minted stealth context. Dropping (or calling [`Self::close`])
/// reads cookies back into the jar and closes the page in a detached
/// task, so cleanup completes even when the caller is cancelled.
pub struct StealthPage {
    page: Option<Page>,
    pub fingerprint: Fingerprint,
    cookie_jar: Arc<CookieJar>,
    _permit: OwnedSemaphorePermit,
}

impl StealthPage {
    #[must_use]
    pub fn page(&self) -> &Page {
        // Some() until close()/drop; the accessor is never reachable after.
        self.page.as_ref().expect("stealth page already closed")
    }

    /// Persist cookies and close. Shielded: runs in a spawned task that
    /// outlives caller cancellation.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            let jar = Arc::clone(&self.cookie_jar);
            let handle = tokio::spawn(async move {
                persist_and_close(page, jar).await;
            });
            // Await cooperatively; if the caller is cancelled the spawned
            // task still finishes.
            let _ = handle.await;
        }
    }
}

impl Drop for StealthPage {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let jar = Arc::clone(&self.cookie_jar);
            tokio::spawn(async move {
                persist_and_close(page, jar).await;
            });
        }
    }
}

async fn persist_and_close(page: Page, jar: Arc<CookieJar>) {
    match page.get_cookies().await {
        Ok(cookies) => jar.store(&cookies),
        Err(e) => debug!("cookie readback failed: {e}"),
    }
    if let Err(e) = page.close().await {
        if !is_browser_closed_error(&e.to_string()) {
            warn!("page close failed: {e}");
        }
    }
}
