//! Process-wide cookie jar keyed by registrable domain.
//!
//! Populated when a context closes, consulted when one opens for the same
//! domain — session cookies earned by one tier survive into the next
//! attempt, which is what gets repeat visits past anti-bot systems.

use std::collections::HashMap;

use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use parking_lot::Mutex;
use tracing::debug;

use crate::urlnorm::registrable_domain;

/// Stored cookie fields; everything needed to reinstall via CDP.
#[derive(Debug, Clone)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub expires: Option<f64>,
}

impl StoredCookie {
    #[must_use]
    pub fn from_cdp(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            secure: cookie.secure,
            http_only: cookie.http_only,
            expires: Some(cookie.expires),
        }
    }

    /// Build the CDP param for reinstalling this cookie.
    pub fn to_param(&self) -> Option<CookieParam> {
        let mut builder = CookieParam::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);
        if let Some(expires) = self.expires {
            builder = builder.expires(expires);
        }
        builder.build().ok()
    }

    fn is_expired(&self, now_epoch: f64) -> bool {
        // CDP reports -1 for session cookies
        matches!(self.expires, Some(exp) if exp > 0.0 && exp < now_epoch)
    }
}

/// Mapping from registrable domain to its accumulated cookies.
#[derive(Debug, Default)]
pub struct CookieJar {
    inner: Mutex<HashMap<String, Vec<StoredCookie>>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist cookies read back from a closing context, grouped by
    /// registrable domain. Later stores replace same-name cookies.
    pub fn store(&self, cookies: &[Cookie]) {
        let mut inner = self.inner.lock();
        for cookie in cookies {
            let domain = registrable_domain(cookie.domain.trim_start_matches('.'));
            if domain.is_empty() {
                continue;
            }
            let bucket = inner.entry(domain).or_default();
            bucket.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
            bucket.push(StoredCookie::from_cdp(cookie));
        }
    }

    /// Cookies for the target URL's registrable domain, minus expired ones.
    #[must_use]
    pub fn cookies_for(&self, target_url: &str) -> Vec<StoredCookie> {
        let Some(host) = url::Url::parse(target_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return Vec::new();
        };
        let domain = registrable_domain(&host);
        let now = chrono::Utc::now().timestamp() as f64;

        let mut inner = self.inner.lock();
        if let Some(bucket) = inner.get_mut(&domain) {
            bucket.retain(|c| !c.is_expired(now));
            debug!(domain, count = bucket.len(), "restoring cookies from jar");
            bucket.clone()
        } else {
            Vec::new()
        }
    }

    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, domain: &str, expires: f64) -> Cookie {
        // Deserialize from the wire shape so the test tracks the CDP type.
        serde_json::from_value(serde_json::json!({
            "name": name,
            "value": "v",
            "domain": domain,
            "path": "/",
            "expires": expires,
            "size": 1,
            "httpOnly": false,
            "secure": false,
            "session": expires < 0.0,
            "priority": "Medium",
            "sameParty": false,
            "sourceScheme": "Secure",
            "sourcePort": 443
        }))
        .expect("valid cookie json")
    }

    #[test]
    fn round_trip_by_registrable_domain() {
        let jar = CookieJar::new();
        jar.store(&[cookie("session", ".shop.example.com", -1.0)]);
        let restored = jar.cookies_for("https://www.example.com/page");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name, "session");
    }

    #[test]
    fn expired_cookies_are_dropped_on_read() {
        let jar = CookieJar::new();
        jar.store(&[cookie("old", "example.com", 1000.0)]);
        assert!(jar.cookies_for("https://example.com/").is_empty());
    }

    #[test]
    fn same_name_cookie_replaces() {
        let jar = CookieJar::new();
        jar.store(&[cookie("a", "example.com", -1.0)]);
        jar.store(&[cookie("a", "example.com", -1.0)]);
        assert_eq!(jar.cookies_for("https://example.com/").len(), 1);
    }
}
