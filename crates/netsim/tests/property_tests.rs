//! Property tests for probabilities and URL patterns

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cockpit_netsim::strategy::{bandwidth_delay, success_probability, FlakyConfig};
use cockpit_netsim::UrlPattern;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_recovery_probability_in_unit_interval(attempt in 0u64..10_000, steps in 1u32..500) {
        let p = success_probability(attempt, steps);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn prop_recovery_probability_monotonic(attempt in 0u64..10_000, steps in 1u32..500) {
        prop_assert!(success_probability(attempt + 1, steps) >= success_probability(attempt, steps));
    }

    #[test]
    fn prop_recovered_at_horizon(steps in 1u32..500, extra in 0u64..100) {
        let p = success_probability(u64::from(steps) + extra, steps);
        prop_assert!((p - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prop_bandwidth_delay_scales_with_size(bytes in 0u64..1_000_000, kbps in 0.1f64..1000.0) {
        let single = bandwidth_delay(bytes, kbps);
        let double = bandwidth_delay(bytes * 2, kbps);
        prop_assert!(double >= single);
    }

    #[test]
    fn prop_flaky_rate_validation(rate in -2.0f64..3.0) {
        let valid = FlakyConfig::new(rate).validate().is_ok();
        prop_assert_eq!(valid, (0.0..=1.0).contains(&rate));
    }

    #[test]
    fn prop_contains_matches_embedding(prefix in "[a-z]{0,12}", needle in "[a-z/]{1,8}", suffix in "[a-z]{0,12}") {
        let url = format!("https://{prefix}{needle}{suffix}");
        prop_assert!(UrlPattern::contains(needle.clone()).matches(&url));
        prop_assert!(UrlPattern::contains_any(["/never-present/", needle.as_str()]).matches(&url));
    }

    #[test]
    fn prop_any_matches_everything(url in ".*") {
        prop_assert!(UrlPattern::Any.matches(&url));
    }

    #[test]
    fn prop_escaped_regex_matches_literal(literal in "[a-z0-9./?=&-]{1,20}") {
        let pattern = UrlPattern::regex(&regex::escape(&literal)).unwrap();
        let url = format!("https://cockpit.test/{literal}");
        prop_assert!(pattern.matches(&url));
    }
}
