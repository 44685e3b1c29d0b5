//! Page metadata derivation.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::schema::PageMetadata;

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("SAFETY: static selector"));
static DESC_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("SAFETY: static selector")
});
static OG_DESC_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("SAFETY: static selector")
});
static HTML_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("SAFETY: static selector"));
static OG_IMAGE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:image"]"#).expect("SAFETY: static selector")
});
static CANONICAL_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"link[rel="canonical"]"#).expect("SAFETY: static selector")
});
static FAVICON_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"link[rel~="icon"], link[rel="apple-touch-icon"]"#)
        .expect("SAFETY: static selector")
});
static ROBOTS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="robots"]"#).expect("SAFETY: static selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("SAFETY: static selector"));

/// Response headers worth echoing into metadata.
const USEFUL_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "link",
    "server",
    "x-powered-by",
    "cache-control",
    "x-frame-options",
    "content-security-policy",
    "x-robots-tag",
    "last-modified",
    "etag",
];

fn meta_content<'a>(document: &'a Html, selector: &Selector) -> Option<&'a str> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|c| !c.is_empty())
}

/// Derive page metadata from the raw payload.
#[must_use]
pub fn extract_metadata(
    document: &Html,
    raw_html: &str,
    url: &Url,
    status_code: u16,
    response_headers: &HashMap<String, String>,
) -> PageMetadata {
    let title = document
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let description = meta_content(document, &DESC_SEL)
        .or_else(|| meta_content(document, &OG_DESC_SEL))
        .unwrap_or_default()
        .to_string();

    let language = document
        .select(&HTML_SEL)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .unwrap_or_default()
        .to_string();

    let og_image = meta_content(document, &OG_IMAGE_SEL).map(str::to_string);

    let canonical_url = document
        .select(&CANONICAL_SEL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let favicon = document
        .select(&FAVICON_SEL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| url.join(href).ok())
        .map(|u| u.to_string());

    let robots = meta_content(document, &ROBOTS_SEL).map(str::to_string);

    let word_count = document
        .select(&BODY_SEL)
        .next()
        .map(|body| body.text().collect::<Vec<_>>().join(" ").split_whitespace().count())
        .unwrap_or(0);

    // 200 words per minute reading speed, rounded up to whole minutes.
    let reading_time_seconds = if word_count > 0 {
        (word_count as u64).div_ceil(200) * 60
    } else {
        0
    };

    let useful: HashMap<String, String> = USEFUL_HEADERS
        .iter()
        .filter_map(|key| {
            response_headers
                .get(*key)
                .map(|v| ((*key).to_string(), v.clone()))
        })
        .collect();

    PageMetadata {
        title,
        description,
        language,
        source_url: url.to_string(),
        status_code,
        word_count,
        reading_time_seconds,
        content_length: raw_html.len(),
        og_image,
        canonical_url,
        favicon,
        robots,
        response_headers: (!useful.is_empty()).then_some(useful),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_fields() {
        let html = r#"<html lang="en"><head>
            <title> My Page </title>
            <meta name="description" content="about things">
            <link rel="canonical" href="https://example.com/canon">
            <link rel="icon" href="/fav.ico">
            <meta name="robots" content="noindex">
        </head><body><p>one two three four</p></body></html>"#;
        let doc = Html::parse_document(html);
        let url = Url::parse("https://example.com/page").expect("valid");
        let meta = extract_metadata(&doc, html, &url, 200, &HashMap::new());

        assert_eq!(meta.title, "My Page");
        assert_eq!(meta.description, "about things");
        assert_eq!(meta.language, "en");
        assert_eq!(meta.word_count, 4);
        assert_eq!(meta.reading_time_seconds, 60);
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/canon"));
        assert_eq!(meta.favicon.as_deref(), Some("https://example.com/fav.ico"));
        assert_eq!(meta.robots.as_deref(), Some("noindex"));
    }

    #[test]
    fn reading_time_rounds_up_per_minute() {
        let words = (0..250).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let html = format!("<html><body><p>{words}</p></body></html>");
        let doc = Html::parse_document(&html);
        let url = Url::parse("https://example.com/").expect("valid");
        let meta = extract_metadata(&doc, &html, &url, 200, &HashMap::new());
        assert_eq!(meta.word_count, 250);
        assert_eq!(meta.reading_time_seconds, 120);
    }

    #[test]
    fn useful_headers_filtered() {
        let doc = Html::parse_document("<html><body></body></html>");
        let url = Url::parse("https://example.com/").expect("valid");
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        headers.insert("set-cookie".to_string(), "secret=1".to_string());
        let meta = extract_metadata(&doc, "", &url, 200, &headers);
        let echoed = meta.response_headers.expect("headers present");
        assert!(echoed.contains_key("content-type"));
        assert!(!echoed.contains_key("set-cookie"));
    }
}
