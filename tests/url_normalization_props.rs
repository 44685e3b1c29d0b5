//! Property tests for URL normalization.

use proptest::prelude::*;
use webharvest::urlnorm::normalize_url;

proptest! {
    #[test]
    fn normalization_is_idempotent(
        host in "[a-z]{3,10}\\.(com|org|io)",
        path in "(/[a-z0-9-]{1,12}){0,4}",
        param_key in "[a-z]{1,8}",
        param_val in "[a-z0-9]{0,8}",
    ) {
        let url = format!("https://{host}{path}?{param_key}={param_val}&utm_source=test");
        if let Some(once) = normalize_url(&url, None) {
            let twice = normalize_url(&once, None).expect("normalized urls stay parseable");
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn tracking_params_never_survive(
        host in "[a-z]{3,10}\\.com",
        tracker in prop::sample::select(vec!["utm_source", "utm_campaign", "gclid", "fbclid", "ref"]),
    ) {
        let url = format!("https://{host}/page?{tracker}=abc&id=1");
        let normalized = normalize_url(&url, None).expect("valid");
        prop_assert!(!normalized.contains(tracker));
        prop_assert!(normalized.contains("id=1"));
    }

    #[test]
    fn plain_fragments_dropped_spa_routes_kept(
        host in "[a-z]{3,10}\\.com",
        frag in "[a-z]{1,8}",
    ) {
        let plain = format!("https://{host}/p#{frag}");
        let normalized = normalize_url(&plain, None).expect("valid");
        prop_assert!(!normalized.contains('#'));

        let spa = format!("https://{host}/p#/{frag}");
        let normalized = normalize_url(&spa, None).expect("valid");
        prop_assert!(normalized.contains("#/"));
    }
}
