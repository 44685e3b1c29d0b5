//! End-to-end extraction pipeline over fixture pages.

use std::collections::HashMap;

use webharvest::extract::extract_artifact;
use webharvest::extract::postprocess::postprocess_markdown;
use webharvest::schema::{FetchResult, ScrapeRequest};

fn fetch(html: &str) -> FetchResult {
    FetchResult {
        raw_html: html.to_string(),
        status_code: 200,
        response_headers: HashMap::from([(
            "content-type".to_string(),
            "text/html; charset=utf-8".to_string(),
        )]),
        source_tier: "tls-impersonate".to_string(),
        best: true,
        ..FetchResult::default()
    }
}

fn request(url: &str, formats: &[&str]) -> ScrapeRequest {
    let mut req = ScrapeRequest::new(url);
    req.formats = formats.iter().map(|f| (*f).to_string()).collect();
    req
}

const DOCS_PAGE: &str = r#"<html lang="en"><head>
    <title>Install | Acme Docs</title>
    <meta name="description" content="Installation guide">
    <meta property="og:image" content="https://docs.acme.dev/og.png">
</head><body>
    <div id="__docusaurus">
        <div class="theme-doc-sidebar-container">
            <a href="/docs/intro">Intro</a>
            <a href="/docs/install">Install</a>
            <a href="/docs/config">Config</a>
        </div>
        <main><div class="theme-doc-markdown">
            <h1 id="install">Installation</h1>
            <p>Install the package with your package manager of choice. The installer
            resolves dependencies, verifies checksums and links the binary into your
            path so the command is available in every shell you open afterwards.
            On first run it creates a configuration directory, seeds it with sane
            defaults, and registers shell completions for bash, zsh and fish. If an
            older release is already present the installer migrates its settings in
            place and leaves a timestamped backup next to the original files, so a
            rollback is always a single copy away. Nothing outside the prefix you
            choose is ever touched during installation or subsequent upgrades.</p>
            <pre><code class="language-bash">acme install --global</code></pre>
            <h2 id="requirements">Requirements</h2>
            <p>A supported operating system and a working network connection are the
            only requirements. Disk usage stays under fifty megabytes.</p>
            <a href="/docs/config">Next: configuration</a>
        </div></main>
    </div>
</body></html>"#;

#[test]
fn doc_page_main_content_extraction() {
    let mut req = request("https://docs.acme.dev/docs/install", &["markdown", "links", "headings"]);
    req.only_main_content = true;

    let artifact = extract_artifact(&fetch(DOCS_PAGE), &req);

    let markdown = artifact.markdown.expect("markdown");
    assert!(markdown.contains("Installation"));
    assert!(markdown.contains("acme install --global"));
    // Sidebar chrome must not leak into main content.
    assert!(!markdown.contains("Intro"));

    let headings = artifact.headings.expect("headings");
    assert_eq!(headings.len(), 2);
    assert_eq!(headings[0].id.as_deref(), Some("install"));

    // Links still come from the full document, sidebar included.
    let links = artifact.links.expect("links");
    assert!(links.contains(&"https://docs.acme.dev/docs/intro".to_string()));
    assert!(links.contains(&"https://docs.acme.dev/docs/config".to_string()));
}

#[test]
fn success_invariant_holds() {
    // When extraction succeeds, at least one requested artifact is
    // non-empty.
    let artifact = extract_artifact(
        &fetch(DOCS_PAGE),
        &request("https://docs.acme.dev/docs/install", &["markdown"]),
    );
    assert!(artifact.markdown.as_deref().is_some_and(|m| !m.is_empty()));
}

#[test]
fn relative_urls_become_absolute_in_markdown() {
    let html = r#"<html><body><main>
        <p>Read the <a href="/guide">guide</a> or see the <img src="images/arch.png" alt="architecture"> overview,
        which walks through every module of the system in depth.</p>
    </main></body></html>"#;
    let artifact = extract_artifact(&fetch(html), &request("https://example.com/docs/", &["markdown"]));
    let markdown = artifact.markdown.expect("markdown");
    assert!(markdown.contains("https://example.com/guide"));
    assert!(markdown.contains("https://example.com/docs/images/arch.png"));
}

#[test]
fn cookie_banner_and_tracker_images_removed() {
    let html = r#"<html><body>
        <div class="cookie-banner">We value your privacy. Accept all cookies?</div>
        <img src="https://tracking.thirdparty.io/pixel.gif" width="1" height="1">
        <article><p>The actual story text continues here with enough words to pass
        every thin-content filter applied by the cleaning passes.</p></article>
    </body></html>"#;
    let artifact = extract_artifact(&fetch(html), &request("https://news.example.com/story", &["markdown", "html"]));
    let clean_html = artifact.html.expect("html");
    assert!(!clean_html.contains("cookie-banner"));
    assert!(!clean_html.contains("pixel.gif"));
    assert!(clean_html.contains("actual story"));
}

#[test]
fn markdown_postprocessing_idempotent_over_pipeline_output() {
    let artifact = extract_artifact(
        &fetch(DOCS_PAGE),
        &request("https://docs.acme.dev/docs/install", &["markdown"]),
    );
    let markdown = artifact.markdown.expect("markdown");
    assert_eq!(postprocess_markdown(&markdown), markdown);
}

#[test]
fn structured_data_and_metadata_round() {
    let artifact = extract_artifact(
        &fetch(DOCS_PAGE),
        &request("https://docs.acme.dev/docs/install", &["structured_data"]),
    );
    assert_eq!(artifact.metadata.title, "Install | Acme Docs");
    assert_eq!(artifact.metadata.description, "Installation guide");
    assert_eq!(artifact.metadata.og_image.as_deref(), Some("https://docs.acme.dev/og.png"));
    assert_eq!(artifact.metadata.status_code, 200);
    let headers = artifact.metadata.response_headers.expect("headers");
    assert!(headers.contains_key("content-type"));
}
