//! Block detector behavior across realistic payloads.

use webharvest::BlockDetector;

fn shell(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
}

#[test]
fn escalation_scenario_tier_one_blocked_tier_two_clean() {
    let detector = BlockDetector::new();

    // Tier 1 came back short with a JS wall.
    let tier1 = shell("example", "<p>Please enable JavaScript to view this page.</p>");
    assert!(detector.is_blocked(&tier1));

    // Tier 2 returned a real page: 40k chars, no block phrases.
    let paragraphs: String = (0..400)
        .map(|i| format!("<p>Paragraph {i} with plenty of ordinary article prose in it.</p>"))
        .collect();
    let tier2 = shell("Example Article", &paragraphs);
    assert!(tier2.len() > 40_000);
    assert!(!detector.is_blocked(&tier2));
}

#[test]
fn large_pages_win_even_with_scary_words() {
    // A review page legitimately discussing captchas is not a block page.
    let body: String = (0..300)
        .map(|_| "<p>We compared six captcha solving services for accessibility.</p>".to_string())
        .collect();
    assert!(!BlockDetector::new().is_blocked(&shell("Captcha tools review", &body)));
}

#[test]
fn cloudflare_interstitial_detected_regardless_of_size() {
    let noise = "<script>var a = 'x'.repeat(64);</script>".repeat(500);
    let html = format!(
        "<html><head><title>Just a moment...</title></head><body>{noise}<p>waiting</p></body></html>"
    );
    assert!(BlockDetector::new().is_blocked(&html));
}

#[test]
fn press_and_hold_wall_detected() {
    let html = shell(
        "Access to this page has been denied",
        "<p>Press &amp; Hold to confirm you are a human (and not a bot).</p>",
    );
    assert!(BlockDetector::new().is_blocked(&html));
}

#[test]
fn empty_payload_counts_as_blocked() {
    assert!(BlockDetector::new().is_blocked(""));
}

#[test]
fn detector_is_a_pure_function() {
    let detector = BlockDetector::new();
    let html = shell("t", "<p>captcha</p>");
    let results: Vec<bool> = (0..5).map(|_| detector.is_blocked(&html)).collect();
    assert!(results.iter().all(|r| *r == results[0]));
}
