//! Per-context fingerprint bundles.
//!
//! Every minted browser context gets a fresh bundle sampled from fixed
//! tables of real-world values. The bundle parameterizes the stealth init
//! script and the CDP overrides, and is discarded with the context.

use rand::Rng;
use rand::prelude::IndexedRandom;

pub const CHROME_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

pub const FIREFOX_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

pub const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1366, 768),
    (1440, 900),
    (1536, 864),
    (1680, 1050),
    (1280, 720),
    (2560, 1440),
];

pub const MOBILE_VIEWPORTS: &[(u32, u32)] = &[(375, 812), (390, 844), (414, 896), (360, 780)];

pub const TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Los_Angeles",
    "America/Denver",
    "America/Phoenix",
    "Europe/London",
    "Europe/Paris",
];

/// (vendor, renderer) pairs as reported by real GPUs through ANGLE.
pub const WEBGL_RENDERERS: &[(&str, &str)] = &[
    (
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce GTX 1080 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce RTX 4070 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (Intel)",
        "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (Intel)",
        "ANGLE (Intel, Intel(R) Iris(R) Xe Graphics Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (AMD)",
        "ANGLE (AMD, AMD Radeon RX 580 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    (
        "Google Inc. (AMD)",
        "ANGLE (AMD, AMD Radeon RX 6700 XT Direct3D11 vs_5_0 ps_5_0, D3D11)",
    ),
    ("Google Inc. (Apple)", "ANGLE (Apple, Apple M1, OpenGL 4.1)"),
    ("Google Inc. (Apple)", "ANGLE (Apple, Apple M2, OpenGL 4.1)"),
];

/// 24 is by far the most common depth; keep the distribution skewed.
pub const COLOR_DEPTHS: &[u32] = &[24, 24, 24, 30, 32];

pub const HW_CONCURRENCY: &[u32] = &[4, 8, 12, 16];

pub const DEVICE_MEMORY: &[u32] = &[4, 8, 16];

/// Which engine a context imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chromium,
    Firefox,
}

/// One randomized fingerprint. Lifetime = one browser context.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub timezone: String,
    pub locale: String,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub color_depth: u32,
    pub hw_concurrency: u32,
    pub device_memory: u32,
    /// Seeds the canvas-noise LCG so noise is stable within a session.
    pub canvas_seed: u64,
    /// Perturbs the audio graph gain.
    pub audio_seed: u64,
}

impl Fingerprint {
    /// Sample a fresh bundle for the given engine.
    #[must_use]
    pub fn sample(engine: BrowserEngine, mobile: bool) -> Self {
        let mut rng = rand::rng();
        let ua_pool = match engine {
            BrowserEngine::Chromium => CHROME_USER_AGENTS,
            BrowserEngine::Firefox => FIREFOX_USER_AGENTS,
        };
        let viewports = if mobile { MOBILE_VIEWPORTS } else { VIEWPORTS };
        let (webgl_vendor, webgl_renderer) = WEBGL_RENDERERS
            .choose(&mut rng)
            .copied()
            .unwrap_or(WEBGL_RENDERERS[0]);
        Self {
            user_agent: ua_pool.choose(&mut rng).copied().unwrap_or(ua_pool[0]).to_string(),
            viewport: viewports.choose(&mut rng).copied().unwrap_or(viewports[0]),
            timezone: TIMEZONES.choose(&mut rng).copied().unwrap_or(TIMEZONES[0]).to_string(),
            locale: "en-US".to_string(),
            webgl_vendor: webgl_vendor.to_string(),
            webgl_renderer: webgl_renderer.to_string(),
            color_depth: COLOR_DEPTHS.choose(&mut rng).copied().unwrap_or(24),
            hw_concurrency: HW_CONCURRENCY.choose(&mut rng).copied().unwrap_or(8),
            device_memory: DEVICE_MEMORY.choose(&mut rng).copied().unwrap_or(8),
            canvas_seed: rng.random(),
            audio_seed: rng.random(),
        }
    }

    /// Platform token consistent with the user agent, for the
    /// Sec-CH-UA-Platform header and `navigator.platform`.
    #[must_use]
    pub fn platform(&self) -> &'static str {
        if self.user_agent.contains("Windows") {
            "Windows"
        } else if self.user_agent.contains("Mac OS") {
            "macOS"
        } else {
            "Linux"
        }
    }

    /// `navigator.platform` value matching the UA's OS token.
    #[must_use]
    pub fn navigator_platform(&self) -> &'static str {
        match self.platform() {
            "Windows" => "Win32",
            "macOS" => "MacIntel",
            _ => "Linux x86_64",
        }
    }

    /// HTTP headers consistent with the bundle's UA.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept-Language".to_string(), format!("{},en;q=0.9", self.locale)),
        ];
        if self.user_agent.contains("Chrome") {
            headers.push((
                "Sec-Ch-Ua-Platform".to_string(),
                format!("\"{}\"", self.platform()),
            ));
            headers.push(("Sec-Ch-Ua-Mobile".to_string(), "?0".to_string()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromium_bundles_use_chrome_uas() {
        for _ in 0..20 {
            let fp = Fingerprint::sample(BrowserEngine::Chromium, false);
            assert!(fp.user_agent.contains("Chrome"));
            assert!(HW_CONCURRENCY.contains(&fp.hw_concurrency));
            assert!(DEVICE_MEMORY.contains(&fp.device_memory));
        }
    }

    #[test]
    fn platform_matches_ua_token() {
        let mut fp = Fingerprint::sample(BrowserEngine::Chromium, false);
        fp.user_agent = CHROME_USER_AGENTS[0].to_string();
        assert_eq!(fp.platform(), "Windows");
        assert_eq!(fp.navigator_platform(), "Win32");

        fp.user_agent = CHROME_USER_AGENTS[2].to_string();
        assert_eq!(fp.platform(), "macOS");

        let sec_ch = fp
            .headers()
            .into_iter()
            .find(|(name, _)| name == "Sec-Ch-Ua-Platform")
            .expect("chrome UA carries platform hint");
        assert_eq!(sec_ch.1, "\"macOS\"");
    }

    #[test]
    fn mobile_flag_switches_viewport_pool() {
        let fp = Fingerprint::sample(BrowserEngine::Chromium, true);
        assert!(MOBILE_VIEWPORTS.contains(&fp.viewport));
    }
}
