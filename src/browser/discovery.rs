//! Deep JS navigation discovery.
//!
//! Documentation sites render their sidebars with JavaScript — a plain
//! HTTP fetch of the start page yields almost no internal links and BFS
//! stalls after a page or two. This script runs in the rendered page:
//! detects the doc framework from signature selectors, waits for the nav
//! to render, expands every collapsible section over several rounds, and
//! collects every same-origin navigation anchor.

use chromiumoxide::Page;
use serde::Deserialize;
use tracing::{debug, warn};

/// Result of one discovery run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryResult {
    /// Detected framework signature name, if any.
    pub framework: Option<String>,
    /// Same-origin navigation links.
    #[serde(default)]
    pub links: Vec<String>,
    /// Every anchor on the page, including external.
    #[serde(default, rename = "allLinks")]
    pub all_links: Vec<String>,
}

/// Framework signatures: detect + nav + expand selector sets for ~17
/// documentation frameworks, with a generic fallback. Runs in-page.
pub const DEEP_NAV_DISCOVERY_JS: &str = r#"
(async () => {
    const result = { framework: null, links: [], allLinks: [] };

    const frameworks = {
        gitbook_modern: {
            detect: ['[class*="gitbook"]', '.gitbook-root', '[data-testid="page.desktopTableOfContents"]'],
            nav: ['.gitbook-root nav a[href]', '[data-testid="page.desktopTableOfContents"] a[href]', 'aside nav a[href]'],
            expand: ['details:not([open]) > summary', '[data-testid="page.desktopTableOfContents"] button[aria-expanded="false"]'],
        },
        gitbook_legacy: {
            detect: ['.book-summary', '.book', '#book-search-input', '.gitbook-link'],
            nav: ['.book-summary a[href]', '.summary a[href]', '.book-summary li a[href]'],
            expand: ['.articles .chapter-toggle', '.chapter > .articles-toggle', '.summary .articles li.chapter'],
        },
        honkit: {
            detect: ['.book.with-summary', 'meta[name="generator"][content*="HonKit"]', '.book-header .btn-group'],
            nav: ['.book-summary a[href]', '.summary a[href]', '.book-summary nav a[href]', '.summary li a[href]'],
            expand: ['.chapter .articles-toggle', '.summary .chapter.active', 'details:not([open]) > summary'],
        },
        docusaurus: {
            detect: ['#__docusaurus', '[class*="docusaurus"]', 'meta[name="generator"][content*="Docusaurus"]'],
            nav: ['.menu__link[href]', '.theme-doc-sidebar-menu a[href]', 'nav.menu a[href]', '.sidebar-nav a[href]'],
            expand: ['.menu__list-item--collapsed > .menu__link--sublist', 'button.menu__caret', '.menu__list-item-collapsible button[aria-expanded="false"]'],
        },
        mkdocs_material: {
            detect: ['.md-sidebar', '.md-content', 'meta[name="generator"][content*="mkdocs"]', '[data-md-component="sidebar"]'],
            nav: ['.md-nav a[href]', '.md-sidebar a[href]', '.md-tabs a[href]', '.md-nav__link[href]'],
            expand: ['label.md-nav__link[for]', '.md-toggle:not(:checked) + label', 'input.md-toggle:not(:checked)'],
        },
        readthedocs: {
            detect: ['.wy-nav-side', '.rst-content', '.wy-side-nav-search', '.wy-breadcrumbs'],
            nav: ['.wy-menu a[href]', '.wy-nav-side a[href]', '.toctree-l1 a[href]', '.toctree-l2 a[href]', '.toctree-l3 a[href]', '.toctree-l4 a[href]'],
            expand: ['.toctree-expand', 'li.toctree-l1:not(.current) > a'],
        },
        sphinx: {
            detect: ['.sphinxsidebar', '.sphinx-tabs', 'meta[name="generator"][content*="Sphinx"]', '.sphinxsidebarwrapper'],
            nav: ['.sphinxsidebarwrapper a[href]', '.sphinxsidebar a[href]', '.toctree-wrapper a[href]', '.wy-menu a[href]'],
            expand: [],
        },
        vuepress: {
            detect: ['.theme-default-content', '.theme-container', '#app .sidebar', 'meta[name="generator"][content*="VuePress"]'],
            nav: ['.sidebar a[href]', '.sidebar-links a[href]', '.sidebar-group a[href]', '.sidebar-link[href]'],
            expand: ['.sidebar-group:not(.is-open) > .sidebar-heading', '.sidebar-group > .sidebar-heading:not(.open)'],
        },
        vitepress: {
            detect: ['.VPSidebar', '.VPDoc', '#VPContent', '.vp-doc'],
            nav: ['.VPSidebar a[href]', '.VPSidebarItem a[href]', '.VPSidebarNav a[href]'],
            expand: ['.VPSidebarItem.collapsed > .item > .indicator', '.VPSidebarItem.collapsed .caret'],
        },
        nextra: {
            detect: ['[class*="nextra"]', '.nextra-sidebar-container', 'meta[name="generator"][content*="Nextra"]'],
            nav: ['.nextra-sidebar-container a[href]', 'nav.nextra-sidebar a[href]', 'aside nav a[href]'],
            expand: ['button[class*="nextra"][aria-expanded="false"]', 'details:not([open]) > summary'],
        },
        hugo_book: {
            detect: ['meta[name="generator"][content*="Hugo"]', '.book-menu', '.book-page'],
            nav: ['.book-menu a[href]', '.book-menu nav a[href]', '#TableOfContents a[href]', 'aside nav a[href]'],
            expand: ['details:not([open]) > summary', '.book-menu input[type="checkbox"]:not(:checked)'],
        },
        docsy: {
            detect: ['.td-sidebar', '.td-content'],
            nav: ['.td-sidebar a[href]', '.td-sidebar-nav a[href]', '#td-section-nav a[href]'],
            expand: ['.td-sidebar .foldable:not(.open) > a', '.td-sidebar details:not([open]) > summary'],
        },
        mdbook: {
            detect: ['#sidebar', '.sidebar-scrollbox', 'meta[name="generator"][content*="mdBook"]', '#menu-bar'],
            nav: ['.sidebar-scrollbox a[href]', '#sidebar a[href]', '.chapter a[href]', 'ol.chapter a[href]'],
            expand: ['.toggle > input:not(:checked) + label', 'details:not([open]) > summary'],
        },
        antora: {
            detect: ['.nav-panel-explore', '.doc', 'meta[name="generator"][content*="Antora"]'],
            nav: ['.nav-panel-explore a[href]', '.nav-menu a[href]', '.nav-list a[href]'],
            expand: ['.nav-item:not(.is-active) > .nav-toggle', '.nav-item-toggle[aria-expanded="false"]'],
        },
        starlight: {
            detect: ['[data-has-sidebar]', 'meta[name="generator"][content*="starlight"]', 'meta[name="generator"][content*="Astro"]'],
            nav: ['nav[aria-label="Main"] a[href]', '[data-has-sidebar] nav a[href]', 'aside nav a[href]', '.sidebar-content a[href]'],
            expand: ['details:not([open]) > summary', 'button[aria-expanded="false"]'],
        },
        mintlify: {
            detect: ['[class*="mintlify"]', '#mintlify', 'meta[name="generator"][content*="Mintlify"]'],
            nav: ['nav a[href]', '.sidebar a[href]', '[role="navigation"] a[href]'],
            expand: ['button[aria-expanded="false"]', 'details:not([open]) > summary'],
        },
        wikijs: {
            detect: ['.wiki-js', '#root.v-application', '[class*="wiki"]'],
            nav: ['.v-navigation-drawer a[href]', '.sidebar a[href]', 'nav a[href]'],
            expand: [],
        },
        confluence: {
            detect: ['#com-atlassian-confluence', '.ia-fixed-sidebar', '[name="ajs-page-id"]'],
            nav: ['.ia-fixed-sidebar a[href]', '.plugin_pagetree a[href]', '.acs-side-bar a[href]'],
            expand: ['.plugin_pagetree_childtoggle_container .expand-control-icon', '.expand-control[aria-expanded="false"]'],
        },
    };

    for (const [name, fw] of Object.entries(frameworks)) {
        for (const sel of fw.detect) {
            try {
                if (document.querySelector(sel)) { result.framework = name; break; }
            } catch {}
        }
        if (result.framework) break;
    }

    // Wait up to 5s for the nav to render.
    const fw = frameworks[result.framework];
    if (fw) {
        const navSels = fw.nav.join(', ');
        for (let i = 0; i < 10; i++) {
            if (document.querySelectorAll(navSels).length >= 3) break;
            await new Promise(r => setTimeout(r, 500));
        }
    }

    // Expansion rounds: open details, check toggles, click expanders.
    for (let round = 0; round < 4; round++) {
        document.querySelectorAll('details:not([open])').forEach(d => {
            try { d.setAttribute('open', ''); d.open = true; } catch {}
        });
        document.querySelectorAll('input[type="checkbox"].md-toggle:not(:checked), .toggle > input:not(:checked)').forEach(cb => {
            try { cb.checked = true; cb.dispatchEvent(new Event('change', {bubbles: true})); } catch {}
        });
        if (fw) {
            for (const sel of fw.expand) {
                document.querySelectorAll(sel).forEach(el => {
                    try { el.click(); } catch {}
                    try {
                        if (el.getAttribute('aria-expanded') === 'false') el.click();
                    } catch {}
                });
            }
        }
        await new Promise(r => setTimeout(r, 600));
    }

    const linkSet = new Set();
    const origin = window.location.origin;
    const addLinks = selector => {
        try {
            document.querySelectorAll(selector).forEach(a => {
                const href = a.href || a.getAttribute('href');
                if (!href || href === '#' || href.startsWith('javascript:') || href.startsWith('mailto:') || href.startsWith('tel:')) return;
                try {
                    const url = new URL(href, origin);
                    url.hash = '';
                    if (url.origin === origin) linkSet.add(url.href);
                } catch {}
            });
        } catch {}
    };

    if (fw) for (const sel of fw.nav) addLinks(sel);

    const genericNavSelectors = [
        'nav a[href]', '[role="navigation"] a[href]', '.sidebar a[href]', 'aside a[href]',
        '.toc a[href]', '#toc a[href]', '.menu a[href]', '.navigation a[href]',
        '.nav-panel a[href]', '.left-sidebar a[href]', '.docs-sidebar a[href]',
    ];
    for (const sel of genericNavSelectors) addLinks(sel);

    // Sparse nav — fall back to every anchor on the page.
    if (linkSet.size < 10) {
        document.querySelectorAll('a[href]').forEach(a => {
            const href = a.href || a.getAttribute('href');
            if (!href || href === '#' || href.startsWith('javascript:') || href.startsWith('mailto:') || href.startsWith('tel:')) return;
            try {
                const url = new URL(href, origin);
                url.hash = '';
                if (url.origin === origin) linkSet.add(url.href);
            } catch {}
        });
    }
    result.links = Array.from(linkSet);

    const allLinkSet = new Set();
    document.querySelectorAll('a[href]').forEach(a => {
        const href = a.href || a.getAttribute('href');
        if (!href || href === '#' || href.startsWith('javascript:') || href.startsWith('mailto:') || href.startsWith('tel:')) return;
        try {
            const url = new URL(href, origin);
            url.hash = '';
            allLinkSet.add(url.href);
        } catch {}
    });
    result.allLinks = Array.from(allLinkSet);

    return result;
})()
"#;

/// Run discovery on a loaded page. When framework-specific nav finds
/// fewer than 10 links the full anchor set supplements it.
pub async fn discover_nav_links(page: &Page) -> DiscoveryResult {
    let evaluated = match page.evaluate(DEEP_NAV_DISCOVERY_JS).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "deep nav discovery script failed");
            return DiscoveryResult::default();
        }
    };

    let mut result: DiscoveryResult = match evaluated.into_value() {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "deep nav discovery returned unparseable result");
            return DiscoveryResult::default();
        }
    };

    debug!(
        framework = result.framework.as_deref().unwrap_or("none"),
        nav_links = result.links.len(),
        all_links = result.all_links.len(),
        "deep nav discovery complete"
    );

    if result.links.len() < 10 && !result.all_links.is_empty() {
        let mut merged: std::collections::BTreeSet<String> =
            result.links.iter().cloned().collect();
        merged.extend(result.all_links.iter().cloned());
        result.links = merged.into_iter().collect();
        debug!(total = result.links.len(), "supplemented nav links with all anchors");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_covers_doc_frameworks() {
        for fw in [
            "gitbook_modern",
            "gitbook_legacy",
            "honkit",
            "docusaurus",
            "mkdocs_material",
            "readthedocs",
            "sphinx",
            "vuepress",
            "vitepress",
            "nextra",
            "hugo_book",
            "docsy",
            "mdbook",
            "antora",
            "starlight",
            "mintlify",
            "wikijs",
            "confluence",
        ] {
            assert!(DEEP_NAV_DISCOVERY_JS.contains(fw), "missing framework: {fw}");
        }
    }

    #[test]
    fn discovery_result_parses_from_js_shape() {
        let raw = serde_json::json!({
            "framework": "docusaurus",
            "links": ["https://docs.example.com/intro"],
            "allLinks": ["https://docs.example.com/intro", "https://github.com/x"]
        });
        let parsed: DiscoveryResult = serde_json::from_value(raw).expect("parses");
        assert_eq!(parsed.framework.as_deref(), Some("docusaurus"));
        assert_eq!(parsed.all_links.len(), 2);
    }
}
