//! HTML cleaning passes.
//!
//! The raw payload is parsed into one mutable tree; every pass collects
//! its target nodes first and then detaches them — detaching during
//! traversal invalidates sibling iterators.

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use url::Url;

use crate::urlnorm::registrable_domain;

/// Tags that can never render as meaningful markdown. `noscript` is
/// intentionally absent — it carries fallback image URLs for lazy-loaded
/// content.
pub const LIGHT_JUNK_TAGS: &[&str] = &[
    "script", "style", "svg", "path", "meta", "link", "canvas", "object", "embed", "source",
    "track", "template", "datalist", "iframe", "dialog", "select", "option",
];

/// Hard junk: removed regardless of extraction mode.
pub const HARD_JUNK_SELECTORS: &[&str] = &[
    // Cookie/consent/GDPR banners
    ".cookie-banner",
    ".cookie-popup",
    "#cookie-consent",
    ".gdpr-banner",
    ".cookie-notice",
    "#cookie-notice",
    ".consent-banner",
    "[class*='cookie-consent']",
    "[class*='cookie-banner']",
    "[class*='cookie-notice']",
    "[class*='consent-']",
    // Modals/popups/overlays
    "[role='dialog']",
    "[role='alertdialog']",
    ".modal",
    ".popup",
    ".overlay-content",
    "[class*='-modal']",
    "[class*='modal-']",
    // Video player chrome
    ".vjs-control-bar",
    ".vjs-menu",
    ".vjs-text-track-settings",
    ".vjs-modal-dialog",
    "[class*='caption-window']",
    "[class*='caption-settings']",
    "[class*='player-controls']",
    // Screen-reader-only helpers
    ".skip-link",
    ".skip-nav",
    ".sr-only",
    ".visually-hidden",
    ".screen-reader-only",
    "[class*='skip-to']",
    // Ads
    ".sidebar-ad",
    "[class*='ad-slot']",
    "[class*='advertisement']",
    // Chat widgets
    "[class*='chat-widget']",
    "[class*='live-chat']",
    "#hubspot-messages-iframe-container",
];

/// Soft boilerplate: removed only in main-content mode, and never inside
/// a recognized main-content container.
pub const SOFT_BOILERPLATE_SELECTORS: &[&str] = &[
    "nav",
    "[role='navigation']",
    ".share-buttons",
    ".social-share",
    "[class*='social-links']",
    "[class*='share-bar']",
    "[class*='share-buttons']",
    "[role='search']",
    ".announcement-bar",
    ".promo-bar",
    ".top-banner",
    ".alert-bar",
    "[class*='newsletter']",
    "[class*='subscribe-form']",
    "[class*='email-signup']",
    ".back-to-top",
    "#back-to-top",
    "[class*='scroll-to-top']",
    ".breadcrumb",
    ".breadcrumbs",
    "[class*='breadcrumb']",
    ".pagination",
    ".pager",
    "[class*='pagination']",
];

/// Blocks eligible for the thin-content filter. Content-bearing tags like
/// `p` and `li` are excluded — a one-sentence paragraph is legitimate.
const THIN_BLOCK_TAGS: &[&str] = &[
    "div", "section", "aside", "figure", "figcaption", "details", "summary",
];

/// Children that carry non-text value; blocks containing them survive the
/// word-count filter.
const VALUABLE_CHILDREN: &[&str] = &["img", "pre", "code", "table", "video", "audio", "picture"];

/// Minimum words for a leaf block to survive. Low enough to keep
/// captions, bylines and CTAs.
pub const BLOCK_WORD_THRESHOLD: usize = 4;

/// CDN hosts that serve legitimate content images from foreign domains.
pub const CDN_DOMAINS: &[&str] = &[
    "cloudfront.net",
    "amazonaws.com",
    "akamaihd.net",
    "akamaized.net",
    "fastly.net",
    "cloudinary.com",
    "imgix.net",
    "shopify.com",
    "squarespace-cdn.com",
    "wp.com",
    "githubusercontent.com",
    "googleusercontent.com",
    "ggpht.com",
    "twimg.com",
    "fbcdn.net",
    "pinimg.com",
    "media-amazon.com",
    "ssl-images-amazon.com",
    "scene7.com",
    "unsplash.com",
    "pexels.com",
];

/// Social platforms whose links degrade to plain text.
pub const SOCIAL_MEDIA_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "pinterest.com",
    "tiktok.com",
    "snapchat.com",
    "reddit.com",
    "youtube.com",
    "whatsapp.com",
    "t.me",
    "discord.gg",
    "discord.com",
];

/// Parse HTML into a mutable tree. The single parse per extraction call.
#[must_use]
pub fn parse(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Serialize a node back to an HTML string.
#[must_use]
pub fn serialize(node: &NodeRef) -> String {
    let mut out = Vec::new();
    if node.serialize(&mut out).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn collect_selected(doc: &NodeRef, selector: &str) -> Vec<NodeRef> {
    match doc.select(selector) {
        Ok(matches) => matches.map(|m| m.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    }
}

/// Detach every node matching the selector.
pub fn remove_selected(doc: &NodeRef, selector: &str) {
    for node in collect_selected(doc, selector) {
        node.detach();
    }
}

/// Pass 1: strip non-renderable tags.
pub fn remove_junk_tags(doc: &NodeRef) {
    for tag in LIGHT_JUNK_TAGS {
        remove_selected(doc, tag);
    }
}

/// Pass 2: remove invisible elements — inline display:none /
/// visibility:hidden, the `hidden` attribute, and aria-hidden elements
/// with almost no text.
pub fn remove_hidden(doc: &NodeRef) {
    let mut doomed = Vec::new();

    if let Ok(styled) = doc.select("[style]") {
        for el in styled {
            let attrs = el.attributes.borrow();
            if let Some(style) = attrs.get("style") {
                let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
                let compact = compact.to_lowercase();
                if compact.contains("display:none") || compact.contains("visibility:hidden") {
                    doomed.push(el.as_node().clone());
                }
            }
        }
    }

    if let Ok(hidden) = doc.select("[hidden]") {
        doomed.extend(hidden.map(|el| el.as_node().clone()));
    }

    if let Ok(aria) = doc.select("[aria-hidden='true']") {
        for el in aria {
            let text_len = el.as_node().text_contents().trim().len();
            if text_len < 30 {
                doomed.push(el.as_node().clone());
            }
        }
    }

    for node in doomed {
        node.detach();
    }
}

/// Pass 3: remove hard junk.
pub fn remove_hard_junk(doc: &NodeRef) {
    for selector in HARD_JUNK_SELECTORS {
        remove_selected(doc, selector);
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn has_descendant_in(node: &NodeRef, names: &[&str]) -> bool {
    node.descendants().any(|d| {
        d.as_element()
            .is_some_and(|el| names.contains(&el.name.local.as_ref()))
    })
}

fn has_heading(node: &NodeRef) -> bool {
    node.descendants().any(|d| {
        d.as_element().is_some_and(|el| {
            let name = el.name.local.as_ref();
            name.len() == 2 && name.starts_with('h') && name.as_bytes()[1].is_ascii_digit()
        })
    })
}

/// Pass 4: per-block thin-content filter. A leaf block (no nested block
/// children) with no valuable children, no heading, and fewer than
/// [`BLOCK_WORD_THRESHOLD`] words is dropped.
pub fn filter_thin_blocks(doc: &NodeRef) {
    let mut candidates = Vec::new();
    for tag in THIN_BLOCK_TAGS {
        candidates.extend(collect_selected(doc, tag));
    }

    for node in candidates {
        if node.parent().is_none() {
            continue; // already detached with an ancestor
        }
        // Wrapper blocks contain other blocks; skip them.
        let nested_block = node.descendants().skip(1).any(|d| {
            d.as_element()
                .is_some_and(|el| THIN_BLOCK_TAGS.contains(&el.name.local.as_ref()))
        });
        if nested_block {
            continue;
        }
        if has_descendant_in(&node, VALUABLE_CHILDREN) || has_heading(&node) {
            continue;
        }
        if word_count(&node.text_contents()) < BLOCK_WORD_THRESHOLD {
            node.detach();
        }
    }
}

/// Pass 5: external-image filter. Images on foreign hosts survive unless
/// they are 1×1 tracking pixels (whose alt text is kept as plain text).
pub fn filter_external_images(doc: &NodeRef, base_url: &Url) {
    let base_root = registrable_domain(base_url.host_str().unwrap_or_default());

    let mut replacements: Vec<(NodeRef, Option<String>)> = Vec::new();
    if let Ok(images) = doc.select("img") {
        for img in images {
            let attrs = img.attributes.borrow();
            let Some(src) = attrs.get("src") else { continue };
            let src = src.trim();
            if src.is_empty() || src.starts_with("data:") {
                continue;
            }
            let Ok(absolute) = base_url.join(src) else {
                continue;
            };
            let img_host = absolute.host_str().unwrap_or_default().to_lowercase();
            if img_host.is_empty() || img_host.ends_with(&base_root) {
                continue;
            }
            if CDN_DOMAINS.iter().any(|cdn| img_host.ends_with(cdn)) {
                continue;
            }
            // Unknown external host: only tracking pixels go.
            let width = attrs.get("width").unwrap_or_default();
            let height = attrs.get("height").unwrap_or_default();
            if matches!(width, "1" | "0") && matches!(height, "1" | "0") {
                let alt = attrs.get("alt").map(|a| a.trim().to_string());
                replacements.push((img.as_node().clone(), alt.filter(|a| !a.is_empty())));
            }
        }
    }

    for (node, alt) in replacements {
        if let Some(alt) = alt {
            node.insert_after(NodeRef::new_text(alt));
        }
        node.detach();
    }
}

/// Pass 6: social-media link stripping — the `<a>` wrapper goes, the text
/// stays.
pub fn strip_social_links(doc: &NodeRef) {
    let mut doomed = Vec::new();
    if let Ok(anchors) = doc.select("a[href]") {
        for anchor in anchors {
            let attrs = anchor.attributes.borrow();
            let Some(href) = attrs.get("href") else { continue };
            let Ok(parsed) = Url::parse(href.trim()) else {
                continue;
            };
            let host = parsed
                .host_str()
                .unwrap_or_default()
                .trim_start_matches("www.")
                .to_lowercase();
            if SOCIAL_MEDIA_DOMAINS.contains(&host.as_str()) {
                doomed.push(anchor.as_node().clone());
            }
        }
    }

    for node in doomed {
        let text = node.text_contents();
        if !text.trim().is_empty() {
            node.insert_after(NodeRef::new_text(text));
        }
        node.detach();
    }
}

/// Resolve every href/src to an absolute URL against the page URL.
/// Fragment-only, mailto:, tel:, javascript: and data: refs are left
/// untouched. Idempotent — absolute URLs resolve to themselves.
pub fn resolve_relative_urls(doc: &NodeRef, base_url: &Url) {
    if let Ok(elements) = doc.select("[href]") {
        for el in elements {
            let mut attrs = el.attributes.borrow_mut();
            if let Some(href) = attrs.get("href").map(str::trim).map(str::to_string) {
                if href.is_empty()
                    || href.starts_with('#')
                    || href.starts_with("javascript:")
                    || href.starts_with("mailto:")
                    || href.starts_with("tel:")
                    || href.starts_with("data:")
                {
                    continue;
                }
                if let Ok(absolute) = base_url.join(&href) {
                    attrs.insert("href", absolute.to_string());
                }
            }
        }
    }
    if let Ok(elements) = doc.select("[src]") {
        for el in elements {
            let mut attrs = el.attributes.borrow_mut();
            if let Some(src) = attrs.get("src").map(str::trim).map(str::to_string) {
                if src.is_empty() || src.starts_with("data:") || src.starts_with("javascript:") {
                    continue;
                }
                if let Ok(absolute) = base_url.join(&src) {
                    attrs.insert("src", absolute.to_string());
                }
            }
        }
    }
}

/// Full light-mode cleaning: passes 1-6 in order.
pub fn clean_light(doc: &NodeRef, base_url: &Url) {
    remove_junk_tags(doc);
    remove_hidden(doc);
    remove_hard_junk(doc);
    filter_thin_blocks(doc);
    filter_external_images(doc, base_url);
    strip_social_links(doc);
}

/// Apply include/exclude CSS selector filters. Excludes detach; includes
/// rebuild the document from the matched fragments.
#[must_use]
pub fn apply_tag_filters(doc: NodeRef, include: &[String], exclude: &[String]) -> NodeRef {
    for selector in exclude {
        remove_selected(&doc, selector);
    }

    if include.is_empty() {
        return doc;
    }

    let mut parts = Vec::new();
    for selector in include {
        for node in collect_selected(&doc, selector) {
            parts.push(serialize(&node));
        }
    }
    if parts.is_empty() {
        return doc;
    }
    parse(&format!("<body>{}</body>", parts.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> NodeRef {
        parse(html)
    }

    fn base() -> Url {
        Url::parse("https://example.com/a/b").expect("valid base")
    }

    #[test]
    fn junk_tags_removed_but_noscript_kept() {
        let d = doc("<body><script>x()</script><noscript><img src=\"/f.png\"></noscript><p>hi</p></body>");
        remove_junk_tags(&d);
        let html = serialize(&d);
        assert!(!html.contains("script>x"));
        assert!(html.contains("noscript"));
    }

    #[test]
    fn hidden_elements_removed() {
        let d = doc(r#"<body><div style="display: none">gone</div><div hidden>gone2</div><div aria-hidden="true">x</div><p>kept</p></body>"#);
        remove_hidden(&d);
        let html = serialize(&d);
        assert!(!html.contains("gone"));
        assert!(html.contains("kept"));
    }

    #[test]
    fn aria_hidden_with_long_text_survives() {
        let long = "this aria-hidden block actually has substantial text content in it";
        let d = doc(&format!(r#"<body><div aria-hidden="true">{long}</div></body>"#));
        remove_hidden(&d);
        assert!(serialize(&d).contains("substantial"));
    }

    #[test]
    fn thin_blocks_dropped_valuable_kept() {
        let d = doc("<body><div>ok</div><div>four words are here</div><div><img src=\"/x.png\"></div></body>");
        filter_thin_blocks(&d);
        let html = serialize(&d);
        assert!(!html.contains(">ok<"));
        assert!(html.contains("four words are here"));
        assert!(html.contains("img"));
    }

    #[test]
    fn tracking_pixel_removed_cdn_image_kept() {
        let d = doc(concat!(
            r#"<body><img src="https://tracker.evil.net/p.gif" width="1" height="1" alt="">"#,
            r#"<img src="https://images.unsplash.com/photo.jpg" width="800" height="600">"#,
            r#"<img src="https://whatever.foreign.net/big.jpg" width="800" height="600"></body>"#
        ));
        filter_external_images(&d, &base());
        let html = serialize(&d);
        assert!(!html.contains("tracker.evil.net"));
        assert!(html.contains("unsplash.com"));
        // Large unknown external image preserved
        assert!(html.contains("whatever.foreign.net"));
    }

    #[test]
    fn social_links_become_text() {
        let d = doc(r#"<body><a href="https://twitter.com/acme">Follow us</a><a href="https://example.com/x">internal</a></body>"#);
        strip_social_links(&d);
        let html = serialize(&d);
        assert!(html.contains("Follow us"));
        assert!(!html.contains("twitter.com"));
        assert!(html.contains("https://example.com/x"));
    }

    #[test]
    fn relative_urls_resolved_idempotently() {
        let d = doc(r##"<body><a href="../c">c</a><img src="/img/x.png"><a href="#frag">anchor</a></body>"##);
        resolve_relative_urls(&d, &base());
        let once = serialize(&d);
        assert!(once.contains("https://example.com/c"));
        assert!(once.contains("https://example.com/img/x.png"));
        assert!(once.contains("#frag"));

        let d2 = doc(&once);
        resolve_relative_urls(&d2, &base());
        assert_eq!(once, serialize(&d2));
    }

    #[test]
    fn include_exclude_filters() {
        let d = doc(r#"<body><main><p>keep</p></main><aside class="promo">drop</aside></body>"#);
        let filtered = apply_tag_filters(d, &["main".to_string()], &[".promo".to_string()]);
        let html = serialize(&filtered);
        assert!(html.contains("keep"));
        assert!(!html.contains("drop"));
    }
}
