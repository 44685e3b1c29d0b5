//! Heading outline and image inventory.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::schema::{Heading, ImageInfo, SrcsetEntry};

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("SAFETY: static selector"));
static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("SAFETY: static selector"));
static PICTURE_SOURCE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("picture > source").expect("SAFETY: static selector"));

/// Ordered heading outline with levels and anchor ids.
#[must_use]
pub fn extract_headings(document: &Html) -> Vec<Heading> {
    document
        .select(&HEADING_SEL)
        .filter_map(|el| {
            let name = el.value().name();
            let level: u8 = name.strip_prefix('h')?.parse().ok()?;
            let text: String = el.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(Heading {
                level,
                text,
                id: el.value().attr("id").map(str::to_string),
            })
        })
        .collect()
}

/// Parse a `srcset` attribute into (url, descriptor) entries, resolving
/// each candidate URL against the page.
#[must_use]
pub fn parse_srcset(srcset: &str, base_url: &Url) -> Vec<SrcsetEntry> {
    srcset
        .split(',')
        .filter_map(|part| {
            let mut tokens = part.split_whitespace();
            let raw = tokens.next()?;
            let url = base_url.join(raw).ok()?;
            Some(SrcsetEntry {
                url: url.to_string(),
                descriptor: tokens.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Image inventory: `<img>` (including `data-src` lazy-load fallback and
/// `srcset`) plus `<picture><source>` candidates, in document order.
#[must_use]
pub fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageInfo> {
    let mut images = Vec::new();

    for img in document.select(&IMG_SEL) {
        let src = img
            .value()
            .attr("src")
            .filter(|s| !s.is_empty())
            .or_else(|| img.value().attr("data-src"))
            .unwrap_or_default();
        if src.is_empty() {
            continue;
        }
        let Ok(absolute) = base_url.join(src) else {
            continue;
        };

        let srcset_raw = img
            .value()
            .attr("srcset")
            .or_else(|| img.value().attr("data-srcset"))
            .unwrap_or_default();

        images.push(ImageInfo {
            src: absolute.to_string(),
            alt: img.value().attr("alt").unwrap_or_default().to_string(),
            width: img.value().attr("width").map(str::to_string),
            height: img.value().attr("height").map(str::to_string),
            loading: img.value().attr("loading").map(str::to_string),
            srcset: if srcset_raw.is_empty() {
                Vec::new()
            } else {
                parse_srcset(srcset_raw, base_url)
            },
            media: None,
            source_type: None,
        });
    }

    for source in document.select(&PICTURE_SOURCE_SEL) {
        let Some(srcset) = source.value().attr("srcset").filter(|s| !s.is_empty()) else {
            continue;
        };
        let media = source.value().attr("media").map(str::to_string);
        let source_type = source.value().attr("type").map(str::to_string);
        for entry in parse_srcset(srcset, base_url) {
            images.push(ImageInfo {
                src: entry.url,
                alt: String::new(),
                media: media.clone(),
                source_type: source_type.clone(),
                ..ImageInfo::default()
            });
        }
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/post").expect("valid")
    }

    #[test]
    fn heading_outline_ordered_with_ids() {
        let doc = Html::parse_document(
            r#"<h1 id="top">Title</h1><h2>Section</h2><h3 id="sub">Sub</h3><h2></h2>"#,
        );
        let headings = extract_headings(&doc);
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].id.as_deref(), Some("top"));
        assert_eq!(headings[1].text, "Section");
        assert_eq!(headings[2].id.as_deref(), Some("sub"));
    }

    #[test]
    fn srcset_parsing() {
        let entries = parse_srcset("/img/a.png 1x, /img/b.png 2x", &base());
        assert_eq!(
            entries,
            vec![
                SrcsetEntry {
                    url: "https://example.com/img/a.png".to_string(),
                    descriptor: "1x".to_string()
                },
                SrcsetEntry {
                    url: "https://example.com/img/b.png".to_string(),
                    descriptor: "2x".to_string()
                },
            ]
        );
    }

    #[test]
    fn data_src_fallback_and_picture_sources() {
        let doc = Html::parse_document(concat!(
            r#"<img data-src="/lazy.png" alt="lazy">"#,
            r#"<picture><source srcset="/wide.webp 1200w" media="(min-width: 800px)" type="image/webp"><img src="/fallback.png"></picture>"#,
        ));
        let images = extract_images(&doc, &base());
        assert!(images.iter().any(|i| i.src.ends_with("/lazy.png")));
        let wide = images
            .iter()
            .find(|i| i.src.ends_with("/wide.webp"))
            .expect("picture source present");
        assert_eq!(wide.media.as_deref(), Some("(min-width: 800px)"));
        assert_eq!(wide.source_type.as_deref(), Some("image/webp"));
    }
}
