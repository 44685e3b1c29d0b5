//! Content extraction pipeline.
//!
//! Turns one raw fetch payload into a [`ScrapeArtifact`]: cleaning,
//! main-content selection, Markdown conversion, and the derived outputs
//! (links, metadata, structured data, headings, images). Extraction is
//! CPU-bound and pure — the crawl consumer runs it on the blocking pool
//! over immutable fetch snapshots.

pub mod clean;
pub mod links;
pub mod main_content;
pub mod markdown;
pub mod media;
pub mod metadata;
pub mod postprocess;
pub mod structured;

use scraper::Html;
use tracing::warn;
use url::Url;

use crate::schema::{FetchResult, ScrapeArtifact, ScrapeRequest};

/// Extract every requested format from a fetch result. Never fails: an
/// extraction error degrades to an empty artifact carrying the page's
/// status code.
#[must_use]
pub fn extract_artifact(fetch: &FetchResult, request: &ScrapeRequest) -> ScrapeArtifact {
    let Ok(base_url) = Url::parse(&request.url) else {
        warn!(url = %request.url, "unparseable url at extraction time");
        return ScrapeArtifact::empty(&request.url, fetch.status_code);
    };

    let raw_html = &fetch.raw_html;
    let mut artifact = ScrapeArtifact::default();

    // One mutable tree for cleaning, one read-only parse for the derived
    // outputs that need the original payload (links, meta, images).
    let document = Html::parse_document(raw_html);

    let clean_html = if request.only_main_content {
        let tree = clean::parse(raw_html);
        clean::remove_junk_tags(&tree);
        clean::remove_hidden(&tree);
        clean::remove_hard_junk(&tree);
        let tree = clean::apply_tag_filters(tree, &request.include_tags, &request.exclude_tags);
        clean::resolve_relative_urls(&tree, &base_url);
        main_content::extract_main_content(&tree, raw_html, &base_url)
    } else {
        let tree = clean::parse(raw_html);
        clean::clean_light(&tree, &base_url);
        let tree = clean::apply_tag_filters(tree, &request.include_tags, &request.exclude_tags);
        clean::resolve_relative_urls(&tree, &base_url);
        clean::serialize(&tree)
    };

    if request.wants("markdown") {
        let mut md = markdown::html_to_markdown(&clean_html);
        if request.only_main_content {
            // Nav menus that survive main-content selection show up as
            // long runs of bare link lines.
            md = postprocess::remove_link_clusters(&md);
        }
        artifact.markdown = Some(md);
    }
    if request.wants("html") {
        artifact.html = Some(clean_html.clone());
    }
    if request.wants("raw_html") {
        artifact.raw_html = Some(raw_html.clone());
    }
    if request.wants("links") {
        artifact.links = Some(links::extract_links(&document, &base_url));
        artifact.links_detail = Some(links::extract_links_detailed(&document, &base_url));
    }
    if request.wants("screenshot") {
        artifact.screenshot = fetch
            .screenshot
            .clone()
            .or_else(|| fetch.action_screenshots.last().cloned());
    }
    if !fetch.action_screenshots.is_empty() {
        artifact.action_screenshots = fetch.action_screenshots.clone();
    }
    if request.wants("structured_data") {
        let data = structured::extract_structured_data(&document);
        if !data.is_empty() {
            artifact.structured_data = Some(data);
        }
    }
    if request.wants("headings") {
        artifact.headings = Some(media::extract_headings(&document));
    }
    if request.wants("images") {
        artifact.images = Some(media::extract_images(&document, &base_url));
    }

    artifact.metadata = metadata::extract_metadata(
        &document,
        raw_html,
        &base_url,
        fetch.status_code,
        &fetch.response_headers,
    );

    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fetch_with(html: &str) -> FetchResult {
        FetchResult {
            raw_html: html.to_string(),
            status_code: 200,
            response_headers: HashMap::new(),
            source_tier: "httpx".to_string(),
            best: true,
            ..FetchResult::default()
        }
    }

    fn request_with(formats: &[&str]) -> ScrapeRequest {
        let mut req = ScrapeRequest::new("https://example.com/article");
        req.formats = formats.iter().map(|f| (*f).to_string()).collect();
        req
    }

    const PAGE: &str = r#"<html lang="en"><head>
        <title>Test Article</title>
        <meta name="description" content="a test page">
        <script type="application/ld+json">{"@type": "Article"}</script>
    </head><body>
        <nav><a href="/other">other</a></nav>
        <main>
            <h1 id="t">Test Article</h1>
            <p>This is the body of the article with enough words to matter for scoring and cleaning passes.</p>
            <img src="/diagram.png" alt="diagram">
            <a href="/next-page">next</a>
        </main>
        <script>analytics()</script>
    </body></html>"#;

    #[test]
    fn full_extraction_produces_all_formats() {
        let fetch = fetch_with(PAGE);
        let req = request_with(&["markdown", "html", "raw_html", "links", "structured_data", "headings", "images"]);
        let artifact = extract_artifact(&fetch, &req);

        let md = artifact.markdown.expect("markdown");
        assert!(md.contains("Test Article"));
        assert!(!md.contains("analytics"));

        let links = artifact.links.expect("links");
        assert!(links.contains(&"https://example.com/next-page".to_string()));

        let headings = artifact.headings.expect("headings");
        assert_eq!(headings[0].text, "Test Article");
        assert_eq!(headings[0].id.as_deref(), Some("t"));

        let images = artifact.images.expect("images");
        assert!(images[0].src.ends_with("/diagram.png"));

        assert!(artifact.structured_data.is_some());
        assert_eq!(artifact.metadata.title, "Test Article");
        assert_eq!(artifact.metadata.status_code, 200);
        assert!(artifact.raw_html.is_some());
    }

    #[test]
    fn unrequested_formats_stay_empty() {
        let artifact = extract_artifact(&fetch_with(PAGE), &request_with(&["markdown"]));
        assert!(artifact.markdown.is_some());
        assert!(artifact.links.is_none());
        assert!(artifact.images.is_none());
        assert!(artifact.raw_html.is_none());
    }

    #[test]
    fn main_content_mode_drops_nav() {
        let mut req = request_with(&["markdown"]);
        req.only_main_content = true;
        let artifact = extract_artifact(&fetch_with(PAGE), &req);
        let md = artifact.markdown.expect("markdown");
        assert!(md.contains("body of the article"));
        assert!(!md.contains("other"));
    }

    #[test]
    fn exclude_tags_filter_applies() {
        let mut req = request_with(&["markdown"]);
        req.exclude_tags = vec!["img".to_string()];
        let artifact = extract_artifact(&fetch_with(PAGE), &req);
        let md = artifact.markdown.expect("markdown");
        assert!(!md.contains("diagram.png"));
    }

    #[test]
    fn bad_url_degrades_to_empty_artifact() {
        let mut req = request_with(&["markdown"]);
        req.url = "not a url".to_string();
        let artifact = extract_artifact(&fetch_with(PAGE), &req);
        assert!(artifact.markdown.is_none());
        assert_eq!(artifact.metadata.status_code, 200);
    }
}
