//! Structured data extraction: JSON-LD, OpenGraph, Twitter Cards, and a
//! meta-tag catch-all.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::schema::StructuredData;

static JSON_LD_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("SAFETY: static selector")
});
static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("SAFETY: static selector"));

/// OpenGraph keys that can repeat and accumulate into lists.
const OG_MULTI_KEYS: &[&str] = &[
    "image",
    "image:url",
    "image:width",
    "image:height",
    "image:type",
    "image:alt",
    "video",
    "video:url",
    "video:type",
    "video:width",
    "video:height",
    "audio",
];

/// Parse every structured-data source in the document. JSON-LD blocks
/// with syntax errors are skipped individually.
#[must_use]
pub fn extract_structured_data(document: &Html) -> StructuredData {
    let mut data = StructuredData::default();

    for script in document.select(&JSON_LD_SEL) {
        let text: String = script.text().collect();
        if text.trim().is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            data.json_ld.push(value);
        }
    }

    let mut open_graph = serde_json::Map::new();
    let mut twitter: HashMap<String, String> = HashMap::new();
    let mut meta_tags: HashMap<String, String> = HashMap::new();

    for meta in document.select(&META_SEL) {
        let content = meta.value().attr("content").unwrap_or_default();

        if let Some(property) = meta.value().attr("property") {
            if let Some(key) = property.strip_prefix("og:") {
                if OG_MULTI_KEYS.contains(&key) {
                    match open_graph
                        .entry(key.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        Value::Array(list) => list.push(Value::String(content.to_string())),
                        // A scalar landed first (non-multi writer); replace with a list.
                        other => {
                            let prior = other.clone();
                            *other = Value::Array(vec![prior, Value::String(content.to_string())]);
                        }
                    }
                } else {
                    open_graph.insert(key.to_string(), Value::String(content.to_string()));
                }
            }
        }

        if let Some(name) = meta.value().attr("name") {
            if let Some(key) = name.strip_prefix("twitter:") {
                twitter.insert(key.to_string(), content.to_string());
            }
        }

        let catch_all_key = meta
            .value()
            .attr("name")
            .or_else(|| meta.value().attr("property"))
            .or_else(|| meta.value().attr("http-equiv"));
        if let Some(key) = catch_all_key {
            if !content.is_empty() {
                meta_tags.insert(key.to_string(), content.to_string());
            }
        }
    }

    data.open_graph = open_graph;
    data.twitter_card = twitter;
    data.meta_tags = meta_tags;
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_ld_parsed_and_bad_blocks_skipped() {
        let html = Html::parse_document(concat!(
            r#"<script type="application/ld+json">{"@type": "Article", "headline": "Hi"}</script>"#,
            r#"<script type="application/ld+json">{not json]</script>"#,
        ));
        let data = extract_structured_data(&html);
        assert_eq!(data.json_ld.len(), 1);
        assert_eq!(data.json_ld[0]["headline"], "Hi");
    }

    #[test]
    fn og_multi_keys_accumulate() {
        let html = Html::parse_document(concat!(
            r#"<meta property="og:image" content="https://e.com/1.png">"#,
            r#"<meta property="og:image" content="https://e.com/2.png">"#,
            r#"<meta property="og:title" content="Page">"#,
        ));
        let data = extract_structured_data(&html);
        let images = data.open_graph["image"].as_array().expect("list");
        assert_eq!(images.len(), 2);
        assert_eq!(data.open_graph["title"], "Page");
    }

    #[test]
    fn twitter_and_catch_all() {
        let html = Html::parse_document(concat!(
            r#"<meta name="twitter:card" content="summary">"#,
            r#"<meta name="author" content="Jo">"#,
            r#"<meta http-equiv="refresh" content="30">"#,
        ));
        let data = extract_structured_data(&html);
        assert_eq!(data.twitter_card["card"], "summary");
        assert_eq!(data.meta_tags["author"], "Jo");
        assert_eq!(data.meta_tags["refresh"], "30");
    }
}
