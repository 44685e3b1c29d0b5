//! Stealth init scripts.
//!
//! A small per-context config object is injected first, then the static
//! patch script reads from it — keeping the big script constant while the
//! fingerprint values rotate per context. Scripts run via
//! `Page.addScriptToEvaluateOnNewDocument` so every patch lands before any
//! page script executes.

use crate::browser::fingerprint::Fingerprint;

/// Per-context config consumed by the static patch scripts. Must be
/// injected before [`CHROMIUM_STEALTH_JS`] / [`FIREFOX_STEALTH_JS`].
#[must_use]
pub fn profile_config_script(fp: &Fingerprint) -> String {
    format!(
        r#"
window.__whProfile = {{
    platform: "{platform}",
    language: "{locale}",
    languages: ["{locale}", "en"],
    hardwareConcurrency: {hw},
    deviceMemory: {mem},
    screenWidth: {width},
    screenHeight: {height},
    colorDepth: {depth},
    webglVendor: "{vendor}",
    webglRenderer: "{renderer}",
    canvasSeed: {canvas_seed},
    audioSeed: {audio_seed}
}};
"#,
        platform = fp.navigator_platform(),
        locale = fp.locale,
        hw = fp.hw_concurrency,
        mem = fp.device_memory,
        width = fp.viewport.0,
        height = fp.viewport.1,
        depth = fp.color_depth,
        vendor = fp.webgl_vendor.replace('"', "\\\""),
        renderer = fp.webgl_renderer.replace('"', "\\\""),
        canvas_seed = fp.canvas_seed % 0xFFFF_FFFF,
        audio_seed = fp.audio_seed % 0xFFFF_FFFF,
    )
}

/// The twenty-patch Chromium script. Patch groups, in order: webdriver,
/// chrome runtime, plugins, WebGL, canvas noise, audio noise, WebRTC
/// relay, permissions, screen, connection, notifications, automation
/// property removal, stack-trace filtering, codecs, offsetHeight,
/// battery, speech voices, trusted keyboard events, visibility,
/// performance.now jitter.
pub const CHROMIUM_STEALTH_JS: &str = r#"
(() => {
    const profile = window.__whProfile || {};

    // -- 1. navigator basics ------------------------------------------------
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    try { delete Object.getPrototypeOf(navigator).webdriver; } catch (e) {}
    Object.defineProperty(navigator, 'languages', { get: () => profile.languages || ['en-US', 'en'] });
    Object.defineProperty(navigator, 'platform', { get: () => profile.platform || 'Win32' });
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => profile.hardwareConcurrency || 8 });
    Object.defineProperty(navigator, 'deviceMemory', { get: () => profile.deviceMemory || 8 });
    Object.defineProperty(navigator, 'maxTouchPoints', { get: () => 0 });

    // -- 2. chrome runtime object with plausible load/CSI values ------------
    const startE = Date.now() - Math.floor(Math.random() * 3000) - 2000;
    window.chrome = window.chrome || {};
    window.chrome.app = { isInstalled: false, InstallState: { DISABLED: 'disabled', INSTALLED: 'installed', NOT_INSTALLED: 'not_installed' }, RunningState: { CANNOT_RUN: 'cannot_run', READY_TO_RUN: 'ready_to_run', RUNNING: 'running' } };
    window.chrome.csi = () => ({ startE, onloadT: startE + Math.floor(Math.random() * 800) + 200, pageT: Math.random() * 3000 + 500, tran: 15 });
    window.chrome.loadTimes = () => ({
        requestTime: startE / 1000,
        startLoadTime: startE / 1000,
        commitLoadTime: startE / 1000 + 0.2,
        finishDocumentLoadTime: startE / 1000 + 0.6,
        finishLoadTime: startE / 1000 + 0.9,
        firstPaintTime: startE / 1000 + 0.4,
        firstPaintAfterLoadTime: 0,
        navigationType: 'Other',
        wasFetchedViaSpdy: true,
        wasNpnNegotiated: true,
        npnNegotiatedProtocol: 'h2',
        wasAlternateProtocolAvailable: false,
        connectionInfo: 'h2'
    });
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: () => ({ onMessage: { addListener: () => {}, removeListener: () => {} }, postMessage: () => {}, disconnect: () => {} }),
            sendMessage: () => {}
        };
    }

    // -- 3. plugin entries with correct prototype ---------------------------
    const mockPlugins = [
        { name: 'Chrome PDF Plugin', description: 'Portable Document Format', filename: 'internal-pdf-viewer' },
        { name: 'Chrome PDF Viewer', description: '', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
        { name: 'Native Client', description: '', filename: 'internal-nacl-plugin' }
    ];
    const pluginProto = Object.getPrototypeOf(navigator.plugins);
    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const plugins = {};
            mockPlugins.forEach((p, i) => { plugins[i] = p; plugins[p.name] = p; });
            Object.setPrototypeOf(plugins, pluginProto);
            Object.defineProperty(plugins, 'length', { value: mockPlugins.length });
            plugins.item = i => plugins[i] || null;
            plugins.namedItem = n => plugins[n] || null;
            plugins.refresh = () => {};
            return plugins;
        }
    });

    // -- 4. WebGL vendor/renderer swap --------------------------------------
    const vendor = profile.webglVendor || 'Google Inc. (Intel)';
    const renderer = profile.webglRenderer || 'ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)';
    const patchGl = proto => {
        const getParameter = proto.getParameter;
        proto.getParameter = function (param) {
            if (param === 37445) return vendor;     // UNMASKED_VENDOR_WEBGL
            if (param === 37446) return renderer;   // UNMASKED_RENDERER_WEBGL
            return getParameter.apply(this, arguments);
        };
        const getExtension = proto.getExtension;
        proto.getExtension = function (name) {
            const ext = getExtension.apply(this, arguments);
            if (name === 'WEBGL_debug_renderer_info' && ext) {
                return { UNMASKED_VENDOR_WEBGL: 37445, UNMASKED_RENDERER_WEBGL: 37446 };
            }
            return ext;
        };
    };
    if (window.WebGLRenderingContext) patchGl(WebGLRenderingContext.prototype);
    if (window.WebGL2RenderingContext) patchGl(WebGL2RenderingContext.prototype);

    // -- 5. canvas pixel noise (session-seeded LCG, <=100 channels) ---------
    let lcg = (profile.canvasSeed || 12345) >>> 0;
    const nextNoise = () => {
        lcg = (lcg * 1664525 + 1013904223) >>> 0;
        return (lcg & 1) === 0 ? 1 : -1;
    };
    const perturb = canvas => {
        try {
            const ctx = canvas.getContext('2d');
            if (!ctx || !canvas.width || !canvas.height) return;
            const data = ctx.getImageData(0, 0, canvas.width, canvas.height);
            const touches = Math.min(100, data.data.length >> 2);
            for (let i = 0; i < touches; i++) {
                const idx = (i * 4919) % data.data.length;
                data.data[idx] = Math.max(0, Math.min(255, data.data[idx] + nextNoise()));
            }
            ctx.putImageData(data, 0, 0);
        } catch (e) {}
    };
    const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function () { perturb(this); return origToDataURL.apply(this, arguments); };
    const origToBlob = HTMLCanvasElement.prototype.toBlob;
    HTMLCanvasElement.prototype.toBlob = function () { perturb(this); return origToBlob.apply(this, arguments); };

    // -- 6. audio graph gain perturbation -----------------------------------
    if (window.AudioContext || window.webkitAudioContext) {
        const AC = window.AudioContext || window.webkitAudioContext;
        const origCreateGain = AC.prototype.createGain;
        const audioJitter = ((profile.audioSeed || 1) % 1000) / 1e7;
        AC.prototype.createGain = function () {
            const gain = origCreateGain.apply(this, arguments);
            const origSet = gain.gain.value;
            try { gain.gain.value = origSet + audioJitter; } catch (e) {}
            return gain;
        };
    }

    // -- 7. WebRTC forced to relay to stop IP leaks -------------------------
    if (window.RTCPeerConnection) {
        const OrigRTC = window.RTCPeerConnection;
        window.RTCPeerConnection = function (config, constraints) {
            const cfg = config || {};
            cfg.iceTransportPolicy = 'relay';
            return new OrigRTC(cfg, constraints);
        };
        window.RTCPeerConnection.prototype = OrigRTC.prototype;
    }

    // -- 8. permissions query: notifications stay 'default' -----------------
    if (navigator.permissions && navigator.permissions.query) {
        const origQuery = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = parameters => {
            if (parameters && parameters.name === 'notifications') {
                return Promise.resolve({ state: 'default', onchange: null });
            }
            return origQuery(parameters);
        };
    }

    // -- 9. consistent screen dimensions ------------------------------------
    const sw = profile.screenWidth || 1920;
    const sh = profile.screenHeight || 1080;
    Object.defineProperty(screen, 'width', { get: () => sw });
    Object.defineProperty(screen, 'height', { get: () => sh });
    Object.defineProperty(screen, 'availWidth', { get: () => sw });
    Object.defineProperty(screen, 'availHeight', { get: () => sh - 40 });
    Object.defineProperty(screen, 'colorDepth', { get: () => profile.colorDepth || 24 });
    Object.defineProperty(screen, 'pixelDepth', { get: () => profile.colorDepth || 24 });

    // -- 10. connection hints ------------------------------------------------
    if (navigator.connection) {
        try {
            Object.defineProperty(navigator.connection, 'rtt', { get: () => 50 });
            Object.defineProperty(navigator.connection, 'downlink', { get: () => 10 });
            Object.defineProperty(navigator.connection, 'effectiveType', { get: () => '4g' });
            Object.defineProperty(navigator.connection, 'saveData', { get: () => false });
        } catch (e) {}
    }

    // -- 11. Notification.permission -----------------------------------------
    if (window.Notification) {
        Object.defineProperty(Notification, 'permission', { get: () => 'default' });
    }

    // -- 12. remove known automation property names --------------------------
    const automationProps = [
        '__webdriver_evaluate', '__selenium_evaluate', '__webdriver_script_function',
        '__webdriver_script_func', '__webdriver_script_fn', '__fxdriver_evaluate',
        '__driver_unwrapped', '__webdriver_unwrapped', '__driver_evaluate',
        '__selenium_unwrapped', '__fxdriver_unwrapped', '_Selenium_IDE_Recorder',
        '_selenium', 'calledSelenium', '$cdc_asdjflasutopfhvcZLmcfl_', '$chrome_asyncScriptInfo',
        '__$webdriverAsyncExecutor', 'webdriver', '__webdriverFunc', 'domAutomation',
        'domAutomationController', '__lastWatirAlert', '__lastWatirConfirm', '__lastWatirPrompt'
    ];
    for (const prop of automationProps) {
        try { delete window[prop]; } catch (e) {}
        try { delete document[prop]; } catch (e) {}
    }

    // -- 13. stack-trace filtering: hide devtools-protocol frames ------------
    const origPrepare = Error.prepareStackTrace;
    Error.prepareStackTrace = function (error, stack) {
        const filtered = stack.filter(frame => {
            const name = (frame.getFileName && frame.getFileName()) || '';
            return !name.includes('__puppeteer') && !name.includes('devtools');
        });
        if (origPrepare) return origPrepare(error, filtered);
        return error.stack;
    };

    // -- 14. media codec support always positive -----------------------------
    const origCanPlay = HTMLMediaElement.prototype.canPlayType;
    HTMLMediaElement.prototype.canPlayType = function (type) {
        if (type && (type.includes('mp4') || type.includes('webm'))) return 'probably';
        return origCanPlay.apply(this, arguments);
    };

    // -- 15. #modernizr visibility probe ------------------------------------
    const offsetDesc = Object.getOwnPropertyDescriptor(HTMLElement.prototype, 'offsetHeight');
    if (offsetDesc && offsetDesc.get) {
        Object.defineProperty(HTMLElement.prototype, 'offsetHeight', {
            get() {
                if (this.id === 'modernizr') return 1;
                return offsetDesc.get.call(this);
            }
        });
    }

    // -- 16. battery returns plausible static values -------------------------
    if (navigator.getBattery) {
        navigator.getBattery = () => Promise.resolve({
            charging: true, chargingTime: 0, dischargingTime: Infinity, level: 0.87,
            addEventListener: () => {}, removeEventListener: () => {}
        });
    }

    // -- 17. canned speech synthesis voices ----------------------------------
    if (window.speechSynthesis) {
        const origGetVoices = speechSynthesis.getVoices.bind(speechSynthesis);
        speechSynthesis.getVoices = () => {
            const voices = origGetVoices();
            if (voices && voices.length) return voices;
            return [
                { voiceURI: 'Google US English', name: 'Google US English', lang: 'en-US', localService: false, default: true },
                { voiceURI: 'Google UK English Female', name: 'Google UK English Female', lang: 'en-GB', localService: false, default: false }
            ];
        };
    }

    // -- 18. synthetic keyboard events carry isTrusted ------------------------
    const origKeyboardEvent = window.KeyboardEvent;
    window.KeyboardEvent = function (type, init) {
        const ev = new origKeyboardEvent(type, init);
        try { Object.defineProperty(ev, 'isTrusted', { get: () => true }); } catch (e) {}
        return ev;
    };
    window.KeyboardEvent.prototype = origKeyboardEvent.prototype;

    // -- 19. page always reports visible -------------------------------------
    Object.defineProperty(document, 'hidden', { get: () => false });
    Object.defineProperty(document, 'visibilityState', { get: () => 'visible' });

    // -- 20. sub-millisecond performance.now noise ----------------------------
    const origNow = performance.now.bind(performance);
    performance.now = () => origNow() + (Math.random() - 0.5) * 0.1;
})();
"#;

/// The leaner Firefox subset: webdriver, languages, platform/oscpu,
/// hardware concurrency, screen, WebRTC relay, canvas noise, automation
/// property removal, permissions, visibility. Shipped to the sidecar for
/// its Firefox contexts.
pub const FIREFOX_STEALTH_JS: &str = r#"
(() => {
    const profile = window.__whProfile || {};

    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => profile.languages || ['en-US', 'en'] });
    Object.defineProperty(navigator, 'platform', { get: () => profile.platform || 'Win32' });
    try {
        Object.defineProperty(navigator, 'oscpu', {
            get: () => (profile.platform === 'MacIntel' ? 'Intel Mac OS X 10.15' : 'Windows NT 10.0; Win64; x64')
        });
    } catch (e) {}
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => profile.hardwareConcurrency || 8 });

    const sw = profile.screenWidth || 1920;
    const sh = profile.screenHeight || 1080;
    Object.defineProperty(screen, 'width', { get: () => sw });
    Object.defineProperty(screen, 'height', { get: () => sh });
    Object.defineProperty(screen, 'availWidth', { get: () => sw });
    Object.defineProperty(screen, 'availHeight', { get: () => sh - 40 });

    if (window.RTCPeerConnection) {
        const OrigRTC = window.RTCPeerConnection;
        window.RTCPeerConnection = function (config, constraints) {
            const cfg = config || {};
            cfg.iceTransportPolicy = 'relay';
            return new OrigRTC(cfg, constraints);
        };
        window.RTCPeerConnection.prototype = OrigRTC.prototype;
    }

    let lcg = (profile.canvasSeed || 12345) >>> 0;
    const nextNoise = () => {
        lcg = (lcg * 1664525 + 1013904223) >>> 0;
        return (lcg & 1) === 0 ? 1 : -1;
    };
    const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function () {
        try {
            const ctx = this.getContext('2d');
            if (ctx && this.width && this.height) {
                const data = ctx.getImageData(0, 0, this.width, this.height);
                const touches = Math.min(100, data.data.length >> 2);
                for (let i = 0; i < touches; i++) {
                    const idx = (i * 4919) % data.data.length;
                    data.data[idx] = Math.max(0, Math.min(255, data.data[idx] + nextNoise()));
                }
                ctx.putImageData(data, 0, 0);
            }
        } catch (e) {}
        return origToDataURL.apply(this, arguments);
    };

    for (const prop of ['webdriver', '__webdriver_evaluate', '__fxdriver_evaluate', '__fxdriver_unwrapped', '_selenium', 'domAutomation']) {
        try { delete window[prop]; } catch (e) {}
        try { delete document[prop]; } catch (e) {}
    }

    if (navigator.permissions && navigator.permissions.query) {
        const origQuery = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = parameters => {
            if (parameters && parameters.name === 'notifications') {
                return Promise.resolve({ state: 'default', onchange: null });
            }
            return origQuery(parameters);
        };
    }

    Object.defineProperty(document, 'hidden', { get: () => false });
    Object.defineProperty(document, 'visibilityState', { get: () => 'visible' });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fingerprint::BrowserEngine;

    #[test]
    fn config_script_carries_bundle_values() {
        let fp = Fingerprint::sample(BrowserEngine::Chromium, false);
        let script = profile_config_script(&fp);
        assert!(script.contains(&format!("hardwareConcurrency: {}", fp.hw_concurrency)));
        assert!(script.contains(&fp.webgl_renderer.replace('"', "\\\"")));
        assert!(script.contains("window.__whProfile"));
    }

    #[test]
    fn chromium_script_covers_all_patch_groups() {
        for marker in [
            "webdriver",
            "loadTimes",
            "plugins",
            "UNMASKED_RENDERER_WEBGL",
            "toDataURL",
            "createGain",
            "iceTransportPolicy",
            "notifications",
            "colorDepth",
            "effectiveType",
            "Notification",
            "$cdc_asdjflasutopfhvcZLmcfl_",
            "prepareStackTrace",
            "canPlayType",
            "modernizr",
            "getBattery",
            "getVoices",
            "isTrusted",
            "visibilityState",
            "performance.now",
        ] {
            assert!(
                CHROMIUM_STEALTH_JS.contains(marker),
                "missing patch marker: {marker}"
            );
        }
    }

    #[test]
    fn firefox_script_is_a_subset() {
        assert!(FIREFOX_STEALTH_JS.contains("oscpu"));
        assert!(FIREFOX_STEALTH_JS.contains("iceTransportPolicy"));
        assert!(!FIREFOX_STEALTH_JS.contains("loadTimes"));
    }
}
