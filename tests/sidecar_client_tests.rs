//! Sidecar protocol client against a mock endpoint.

use webharvest::browser::fingerprint::BrowserEngine;
use webharvest::schema::ScrapeRequest;
use webharvest::sidecar::SidecarClient;

#[tokio::test]
async fn fetch_maps_response_into_fetch_result() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "html": "<html><body><p>rendered</p></body></html>",
        "status_code": 200,
        "screenshot": null,
        "action_screenshots": [],
        "response_headers": {"content-type": "text/html"},
        "success": true,
        "error": null,
        "discovered_links": [],
        "doc_framework": null
    });
    let mock = server
        .mock("POST", "/scrape")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = SidecarClient::new(&server.url()).expect("client builds");
    let request = ScrapeRequest::new("https://example.com/app");
    let result = client
        .fetch(&request, BrowserEngine::Firefox, None)
        .await
        .expect("fetch result");

    assert_eq!(result.source_tier, "firefox-stealth");
    assert_eq!(result.status_code, 200);
    assert!(result.raw_html.contains("rendered"));
    assert_eq!(result.response_headers["content-type"], "text/html");
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_html_yields_no_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/scrape")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"html": "", "success": false, "error": "navigation failed"}"#)
        .create_async()
        .await;

    let client = SidecarClient::new(&server.url()).expect("client builds");
    let request = ScrapeRequest::new("https://example.com/app");
    assert!(
        client
            .fetch(&request, BrowserEngine::Chromium, None)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn discovery_returns_links_and_framework() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/scrape")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "html": "",
                "success": true,
                "discovered_links": [
                    "https://docs.example.com/intro",
                    "https://docs.example.com/setup"
                ],
                "doc_framework": "mkdocs_material"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = SidecarClient::new(&server.url()).expect("client builds");
    let (links, framework) = client
        .discover("https://docs.example.com/")
        .await
        .expect("discovery result");
    assert_eq!(links.len(), 2);
    assert_eq!(framework.as_deref(), Some("mkdocs_material"));
}
