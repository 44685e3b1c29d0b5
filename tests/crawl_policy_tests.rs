//! Crawl-side policy: admissibility, robots, the quality gate, and
//! frontier score arithmetic.

use webharvest::crawl::admission::UrlFilter;
use webharvest::crawl::quality::{self, SkipReason};
use webharvest::crawl::robots::RobotsCache;
use webharvest::crawl::score::{frontier_score, score_url};
use webharvest::schema::CrawlRequest;

fn crawl_config(json: serde_json::Value) -> CrawlRequest {
    serde_json::from_value(json).expect("valid crawl config")
}

#[tokio::test]
async fn robots_disallow_scenario() {
    let robots = RobotsCache::new();
    robots
        .insert("https://example.com", "User-agent: *\nDisallow: /private/\n")
        .await;

    // With respect_robots_txt=true the engine consults this before
    // adding; the rule itself:
    assert!(!robots.is_allowed("https://example.com/private/x").await);
    assert!(robots.is_allowed("https://example.com/public/x").await);
}

#[test]
fn quality_gate_scenario_login_wall_with_six_hundred_words() {
    let filler = "word ".repeat(600 - 8);
    let markdown = format!("{filler} Sign in to your account. Create account to continue.");
    assert_eq!(quality::evaluate(&markdown), Some(SkipReason::LoginWall));
}

#[test]
fn quality_gate_passes_substantial_articles() {
    let markdown = "A sentence of real content. ".repeat(250);
    assert_eq!(quality::evaluate(&markdown), None);
}

#[test]
fn frontier_score_is_base_minus_depth() {
    for depth in 0..5 {
        let url = "https://example.com/widgets/red-large-widget";
        assert!((frontier_score(url, depth) - (score_url(url) - f64::from(depth))).abs() < 1e-9);
    }
}

#[test]
fn depth_bound_enforced_at_admission() {
    let filter = UrlFilter::new(&crawl_config(serde_json::json!({
        "url": "https://example.com/",
        "max_depth": 2
    })))
    .expect("valid");
    assert!(filter.should_crawl("https://example.com/a/b", 2));
    assert!(!filter.should_crawl("https://example.com/a/b", 3));
}

#[test]
fn include_globs_narrow_the_crawl() {
    let filter = UrlFilter::new(&crawl_config(serde_json::json!({
        "url": "https://example.com/",
        "max_depth": 5,
        "include_paths": ["/blog/**"],
        "exclude_paths": ["/blog/drafts/**"]
    })))
    .expect("valid");

    assert!(filter.should_crawl("https://example.com/blog/2024-05/launch", 1));
    assert!(!filter.should_crawl("https://example.com/shop/item", 1));
    assert!(!filter.should_crawl("https://example.com/blog/drafts/wip", 1));
}

#[test]
fn utility_pages_never_enter_the_frontier() {
    let filter = UrlFilter::new(&crawl_config(serde_json::json!({
        "url": "https://shop.example.com/",
        "max_depth": 3
    })))
    .expect("valid");

    for path in ["/signin", "/cart", "/checkout/review", "/account/orders", "/privacy-policy"] {
        let url = format!("https://shop.example.com{path}");
        assert!(!filter.should_crawl(&url, 1), "{path} should be rejected");
    }
    assert!(filter.should_crawl("https://shop.example.com/products/red-wool-socks", 1));
}
