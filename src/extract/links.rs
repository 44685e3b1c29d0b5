//! Link derivation: flat link sets for the crawl frontier, and the
//! detailed internal/external split with anchor context.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::schema::{LinkGroup, LinkInfo, LinksDetail};
use crate::urlnorm::resolve_link;

static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("SAFETY: static selector"));
static LINK_REL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[href]").expect("SAFETY: static selector"));
static FORM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form[action]").expect("SAFETY: static selector"));
static DATA_HREF_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-href]").expect("SAFETY: static selector"));
static DATA_URL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-url]").expect("SAFETY: static selector"));

/// All navigable links, resolved to absolute URLs, sorted and deduped.
/// Covers `<a href>`, `<link rel=next|prev|canonical>`, `<form action>`
/// and the `data-href`/`data-url` SPA attributes.
#[must_use]
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: BTreeSet<String> = BTreeSet::new();

    for el in document.select(&ANCHOR_SEL) {
        if let Some(href) = el.value().attr("href") {
            if let Some(resolved) = resolve_link(href, base_url) {
                links.insert(resolved);
            }
        }
    }

    for el in document.select(&LINK_REL_SEL) {
        let rel = el.value().attr("rel").unwrap_or_default();
        if ["next", "prev", "canonical"].iter().any(|r| rel.contains(r)) {
            if let Some(href) = el.value().attr("href") {
                if let Some(resolved) = resolve_link(href, base_url) {
                    links.insert(resolved);
                }
            }
        }
    }

    for el in document.select(&FORM_SEL) {
        if let Some(action) = el.value().attr("action") {
            if let Some(resolved) = resolve_link(action, base_url) {
                links.insert(resolved);
            }
        }
    }

    for sel in [&*DATA_HREF_SEL, &*DATA_URL_SEL] {
        for el in document.select(sel) {
            let attr = el
                .value()
                .attr("data-href")
                .or_else(|| el.value().attr("data-url"));
            if let Some(raw) = attr {
                if let Some(resolved) = resolve_link(raw, base_url) {
                    links.insert(resolved);
                }
            }
        }
    }

    links.into_iter().collect()
}

/// Internal/external link split with per-link anchor text, title, rel
/// nofollow and target flags.
#[must_use]
pub fn extract_links_detailed(document: &Html, base_url: &Url) -> LinksDetail {
    let base_host = base_url.host_str().unwrap_or_default();
    let mut internal = Vec::new();
    let mut external = Vec::new();

    for el in document.select(&ANCHOR_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            continue;
        }
        let Ok(absolute) = base_url.join(href) else {
            continue;
        };
        let mut clean = absolute.clone();
        clean.set_fragment(None);

        let text: String = el.text().collect::<String>().trim().to_string();
        let info = LinkInfo {
            url: clean.to_string(),
            text: (!text.is_empty()).then_some(text),
            title: el
                .value()
                .attr("title")
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            nofollow: el
                .value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| r == "nofollow")),
            new_tab: el.value().attr("target") == Some("_blank"),
        };

        if absolute.host_str().unwrap_or_default() == base_host {
            internal.push(info);
        } else {
            external.push(info);
        }
    }

    LinksDetail {
        total: internal.len() + external.len(),
        internal: LinkGroup {
            count: internal.len(),
            links: internal,
        },
        external: LinkGroup {
            count: external.len(),
            links: external,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    fn base() -> Url {
        Url::parse("https://example.com/docs/intro").expect("valid")
    }

    #[test]
    fn collects_all_link_sources() {
        let doc = parse(concat!(
            r#"<a href="/a">a</a>"#,
            r#"<link rel="next" href="/docs/next">"#,
            r#"<link rel="stylesheet" href="/style.css">"#,
            r#"<form action="/search"></form>"#,
            r#"<div data-href="/spa-route">x</div>"#,
            r#"<a href="mailto:hi@example.com">mail</a>"#,
        ));
        let links = extract_links(&doc, &base());
        assert!(links.contains(&"https://example.com/a".to_string()));
        assert!(links.contains(&"https://example.com/docs/next".to_string()));
        assert!(links.contains(&"https://example.com/search".to_string()));
        assert!(links.contains(&"https://example.com/spa-route".to_string()));
        assert!(!links.iter().any(|l| l.contains("style.css")));
        assert!(!links.iter().any(|l| l.contains("mailto")));
    }

    #[test]
    fn links_are_sorted_and_unique() {
        let doc = parse(r#"<a href="/b">1</a><a href="/a">2</a><a href="/b#frag">3</a>"#);
        let links = extract_links(&doc, &base());
        assert_eq!(
            links,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string()
            ]
        );
    }

    #[test]
    fn detailed_split_flags() {
        let doc = parse(concat!(
            r#"<a href="/in" title="Internal" rel="nofollow noopener">inside</a>"#,
            r#"<a href="https://other.org/x" target="_blank">outside</a>"#,
        ));
        let detail = extract_links_detailed(&doc, &base());
        assert_eq!(detail.total, 2);
        assert_eq!(detail.internal.count, 1);
        assert_eq!(detail.external.count, 1);

        let internal = &detail.internal.links[0];
        assert!(internal.nofollow);
        assert_eq!(internal.title.as_deref(), Some("Internal"));
        let external = &detail.external.links[0];
        assert!(external.new_tab);
        assert_eq!(external.text.as_deref(), Some("outside"));
    }
}
