//! Main-content selection.
//!
//! Framework-specific selectors first (doc sites bury content under
//! framework chrome that generic selectors either miss or over-include),
//! then generic semantic selectors, then a readability-style secondary
//! extractor when the heuristic result is weak, and finally body minus
//! top-level chrome.

use kuchiki::NodeRef;
use tracing::debug;
use url::Url;

use super::clean;

/// (framework, detect selectors, content selectors, extra boilerplate).
type FrameworkEntry = (&'static str, &'static [&'static str], &'static [&'static str], &'static [&'static str]);

/// Doc-framework extraction map: detection signatures, content selectors
/// tried in order, and framework chrome to remove first.
pub const DOC_FRAMEWORKS: &[FrameworkEntry] = &[
    (
        "gitbook",
        &["[class*='gitbook']", ".gitbook-root", ".book-summary"],
        &[".gitbook-root main", ".page-inner .markdown-section", ".page-inner section", ".page-wrapper .page-inner"],
        &[".gitbook-root nav", ".gitbook-root aside", ".book-summary", ".book-header", ".page-footer"],
    ),
    (
        "honkit",
        &[".book.with-summary", ".book-summary", ".book-header .btn-group"],
        &[".book-body .page-inner", ".book-body .markdown-section", ".body-inner .page-inner"],
        &[".book-summary", ".book-header", ".book-footer", ".page-footer", ".navigation"],
    ),
    (
        "docusaurus",
        &["#__docusaurus", "[class*='docusaurus']"],
        &[".theme-doc-markdown", "article[class*='docItemCol']", ".docMainContainer article", "main article"],
        &[".theme-doc-sidebar-container", ".theme-doc-footer", ".pagination-nav", ".docSidebarContainer", "[class*='tableOfContents']"],
    ),
    (
        "mkdocs",
        &[".md-sidebar", ".md-content", "[data-md-component='sidebar']"],
        &[".md-content article", ".md-content", "[data-md-component='content'] article"],
        &[".md-sidebar", ".md-header", ".md-footer", ".md-tabs", "[data-md-component='sidebar']"],
    ),
    (
        "readthedocs",
        &[".wy-nav-side", ".rst-content"],
        &[".rst-content", ".wy-nav-content .section", ".document .section"],
        &[".wy-nav-side", ".wy-breadcrumbs", ".wy-nav-top", ".rst-footer-buttons", ".footer"],
    ),
    (
        "sphinx",
        &[".sphinxsidebar", ".sphinxsidebarwrapper"],
        &[".body", ".document .body", ".documentwrapper .body"],
        &[".sphinxsidebar", ".related", ".footer", ".clearer"],
    ),
    (
        "vuepress",
        &[".theme-default-content", ".theme-container"],
        &[".theme-default-content", ".page .content__default", ".page main"],
        &[".sidebar", ".navbar", ".page-edit", ".page-nav"],
    ),
    (
        "vitepress",
        &[".VPSidebar", ".VPDoc", "#VPContent"],
        &[".VPDoc .vp-doc", ".VPContent main", ".vp-doc"],
        &[".VPSidebar", ".VPNav", ".VPFooter", ".VPDocFooter", "[class*='aside']"],
    ),
    (
        "nextra",
        &["[class*='nextra']", ".nextra-sidebar-container"],
        &["article.nextra-content", "main article", ".nextra-body main article"],
        &[".nextra-sidebar-container", "nav.nextra-sidebar", ".nextra-toc"],
    ),
    (
        "hugo",
        &[".book-menu", ".book-page"],
        &[".book-page article", "main article", ".prose", ".markdown"],
        &[".book-menu", ".book-footer", "#TableOfContents"],
    ),
    (
        "mdbook",
        &[".sidebar-scrollbox", "#sidebar"],
        &["#content main", "#content .content", "main"],
        &["#sidebar", ".sidebar-scrollbox", "#menu-bar"],
    ),
    (
        "starlight",
        &["[data-has-sidebar]"],
        &["main article", "[data-pagefind-body]", "main [data-has-sidebar] article"],
        &["aside nav", "header", ".pagination-links"],
    ),
    (
        "mintlify",
        &["[class*='mintlify']"],
        &["main article", "article.prose"],
        &["nav", "aside", "footer"],
    ),
];

/// Generator-meta fallback names checked when no selector signature hits.
const GENERATOR_NAMES: &[&str] = &[
    "sphinx", "mkdocs", "hugo", "docusaurus", "vuepress", "vitepress", "nextra", "honkit",
    "mdbook", "antora", "starlight", "astro", "mintlify",
];

/// Generic semantic selectors tried when no framework is detected.
const GENERIC_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main-content",
    ".main-content",
];

fn text_len(node: &NodeRef) -> usize {
    node.text_contents().split_whitespace().collect::<Vec<_>>().join(" ").len()
}

fn select_first(doc: &NodeRef, selector: &str) -> Option<NodeRef> {
    doc.select_first(selector).ok().map(|m| m.as_node().clone())
}

/// Detect the documentation framework from the parsed tree.
#[must_use]
pub fn detect_doc_framework(doc: &NodeRef) -> Option<&'static str> {
    for (name, detect, _, _) in DOC_FRAMEWORKS {
        for selector in *detect {
            if select_first(doc, selector).is_some() {
                return Some(name);
            }
        }
    }
    // Meta generator fallback.
    if let Ok(gen_el) = doc.select_first("meta[name='generator']") {
        let attrs = gen_el.attributes.borrow();
        let content = attrs.get("content").unwrap_or_default().to_lowercase();
        for name in GENERATOR_NAMES {
            if content.contains(name) {
                // Generator aliases map onto the extraction table names.
                let mapped = match *name {
                    "astro" => "starlight",
                    "antora" => "mdbook",
                    other => other,
                };
                if let Some((canonical, ..)) = DOC_FRAMEWORKS.iter().find(|(n, ..)| *n == mapped) {
                    return Some(canonical);
                }
            }
        }
    }
    None
}

/// Framework-aware or heuristic main-container selection on the cleaned
/// tree. Returns `None` when nothing passes the text-length thresholds.
#[must_use]
pub fn find_main_container(doc: &NodeRef) -> Option<NodeRef> {
    if let Some(framework) = detect_doc_framework(doc) {
        if let Some((_, _, content_selectors, boilerplate)) =
            DOC_FRAMEWORKS.iter().find(|(name, ..)| *name == framework)
        {
            for selector in *boilerplate {
                clean::remove_selected(doc, selector);
            }
            for selector in *content_selectors {
                if let Some(node) = select_first(doc, selector) {
                    if text_len(&node) > 100 {
                        debug!(framework, selector, "doc framework content found");
                        return Some(node);
                    }
                }
            }
        }
    }

    for selector in GENERIC_SELECTORS {
        if let Some(node) = select_first(doc, selector) {
            if text_len(&node) > 200 {
                return Some(node);
            }
        }
    }

    None
}

/// Aggressive body fallback: strip top-level header/footer and small
/// asides, return what's left.
#[must_use]
pub fn smart_body_extract(doc: &NodeRef) -> Option<NodeRef> {
    let body = select_first(doc, "body")?;

    let mut doomed = Vec::new();
    for child in body.children() {
        let Some(el) = child.as_element() else { continue };
        match el.name.local.as_ref() {
            "header" | "footer" => doomed.push(child.clone()),
            "aside" => {
                if text_len(&child) < 500 {
                    doomed.push(child.clone());
                }
            }
            _ => {}
        }
    }
    for node in doomed {
        node.detach();
    }
    Some(body)
}

/// Main-content mode extraction over an already light-cleaned tree.
/// Applies soft-boilerplate stripping, framework/heuristic selection, the
/// readability comparison, and the smart-body fallback. Returns the HTML
/// of the chosen container.
#[must_use]
pub fn extract_main_content(doc: &NodeRef, raw_html: &str, url: &Url) -> String {
    // Soft boilerplate goes first — unless inside a recognized container.
    strip_soft_boilerplate(doc);

    let heuristic = find_main_container(doc).or_else(|| smart_body_extract(doc));
    let heuristic_len = heuristic.as_ref().map_or(0, text_len);

    // Strong heuristic result: skip the secondary extractor.
    if heuristic_len > 500 {
        return heuristic.map(|n| clean::serialize(&n)).unwrap_or_default();
    }

    // Weak result — consult the readability-style extractor and keep
    // whichever captured meaningfully more text.
    let secondary = readability_extract(raw_html, url);
    let secondary_len = secondary
        .as_ref()
        .map_or(0, |html| clean::parse(html).text_contents().len());

    if heuristic_len as f64 > secondary_len as f64 * 1.2 {
        heuristic.map(|n| clean::serialize(&n)).unwrap_or_default()
    } else if secondary_len > 100 {
        debug!(heuristic_len, secondary_len, "using readability extraction");
        secondary.unwrap_or_default()
    } else {
        heuristic.map(|n| clean::serialize(&n)).unwrap_or_default()
    }
}

/// Remove soft boilerplate outside recognized main-content containers.
fn strip_soft_boilerplate(doc: &NodeRef) {
    for selector in clean::SOFT_BOILERPLATE_SELECTORS {
        let matches: Vec<NodeRef> = match doc.select(selector) {
            Ok(m) => m.map(|el| el.as_node().clone()).collect(),
            Err(()) => continue,
        };
        for node in matches {
            if !inside_main_content(&node) {
                node.detach();
            }
        }
    }
}

fn inside_main_content(node: &NodeRef) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(el) = parent.as_element() {
            let name = el.name.local.as_ref();
            if name == "main" || name == "article" {
                return true;
            }
            let attrs = el.attributes.borrow();
            if attrs.get("role") == Some("main") {
                return true;
            }
            if matches!(attrs.get("id"), Some("content" | "main-content")) {
                return true;
            }
            if let Some(class) = attrs.get("class") {
                if class.split_whitespace().any(|c| {
                    matches!(
                        c,
                        "content" | "main-content" | "post" | "entry" | "product" | "product-detail"
                    )
                }) {
                    return true;
                }
            }
        }
        current = parent.parent();
    }
    false
}

/// Secondary extractor over the raw payload.
fn readability_extract(raw_html: &str, url: &Url) -> Option<String> {
    let mut cursor = std::io::Cursor::new(raw_html.as_bytes());
    match readability::extractor::extract(&mut cursor, url) {
        Ok(product) if !product.content.is_empty() => Some(product.content),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "readability extraction failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> NodeRef {
        clean::parse(html)
    }

    #[test]
    fn detects_docusaurus() {
        let d = doc(r#"<html><body><div id="__docusaurus"><main>x</main></div></body></html>"#);
        assert_eq!(detect_doc_framework(&d), Some("docusaurus"));
    }

    #[test]
    fn detects_from_generator_meta() {
        let d = doc(r#"<html><head><meta name="generator" content="mkdocs-1.5.3"></head><body></body></html>"#);
        assert_eq!(detect_doc_framework(&d), Some("mkdocs"));
    }

    #[test]
    fn generic_selector_needs_enough_text() {
        let short = doc("<html><body><main>tiny</main></body></html>");
        assert!(find_main_container(&short).is_none());

        let long_text = "content ".repeat(60);
        let long = doc(&format!("<html><body><main><p>{long_text}</p></main><nav>chrome</nav></body></html>"));
        let found = find_main_container(&long).expect("main found");
        assert!(found.text_contents().contains("content"));
    }

    #[test]
    fn framework_content_selector_wins_over_generic() {
        let body = "words ".repeat(40);
        let d = doc(&format!(
            r#"<html><body><div id="__docusaurus">
                <div class="theme-doc-sidebar-container"><a>nav1</a></div>
                <main><div class="theme-doc-markdown">{body}</div></main>
            </div></body></html>"#
        ));
        let found = find_main_container(&d).expect("content found");
        assert!(found.text_contents().contains("words"));
        // Sidebar chrome was removed from the tree as part of selection.
        assert!(d.select_first(".theme-doc-sidebar-container").is_err());
    }

    #[test]
    fn smart_body_drops_top_level_chrome() {
        let d = doc(
            "<html><body><header>site chrome</header><div><p>real body</p></div><footer>legal</footer></body></html>",
        );
        let body = smart_body_extract(&d).expect("body");
        let html = clean::serialize(&body);
        assert!(!html.contains("site chrome"));
        assert!(!html.contains("legal"));
        assert!(html.contains("real body"));
    }

    #[test]
    fn soft_boilerplate_kept_inside_main() {
        let filler = "actual article text ".repeat(40);
        let d = doc(&format!(
            r#"<html><body><nav>top nav</nav><main><nav>in-content nav</nav><p>{filler}</p></main></body></html>"#
        ));
        strip_soft_boilerplate(&d);
        let html = clean::serialize(&d);
        assert!(!html.contains("top nav"));
        assert!(html.contains("in-content nav"));
    }
}
