//! UrlIndex tests
//!
//! Uniqueness, idempotent create, reverse-index consistency and the
//! click/analytics scenarios against the public API.

use std::collections::HashSet;
use std::sync::Arc;

use linkkeeper::analytics::{EnrichedAccessInfo, RawRequestInfo};
use linkkeeper::errors::LinkkeeperError;
use linkkeeper::shortener::UrlIndex;

// =============================================================================
// Helpers
// =============================================================================

fn visitor(ip: &str) -> EnrichedAccessInfo {
    EnrichedAccessInfo {
        source_address: Some(ip.to_string()),
        client_agent: Some("Mozilla/5.0 (test)".to_string()),
        ..Default::default()
    }
}

// =============================================================================
// Create
// =============================================================================

#[test]
fn test_distinct_urls_get_distinct_codes() {
    let index = UrlIndex::default();
    let mut codes = HashSet::new();

    for i in 0..500 {
        let result = index
            .create_short_url(&format!("https://example.com/page/{}", i))
            .unwrap();
        assert!(!result.existing_url);
        assert!(codes.insert(result.short_code), "duplicate code issued");
    }

    assert_eq!(index.get_system_stats().total_urls, 500);
}

#[test]
fn test_create_twice_returns_same_code() {
    let index = UrlIndex::default();
    let first = index.create_short_url("https://example.com/a").unwrap();
    let stats_before = index.get_system_stats();

    let second = index.create_short_url("https://example.com/a").unwrap();

    assert_eq!(first.short_code, second.short_code);
    assert!(second.existing_url);
    assert_eq!(index.get_system_stats().total_urls, stats_before.total_urls);
}

#[test]
fn test_create_does_not_reset_clicks() {
    let index = UrlIndex::default();
    let code = index.create_short_url("https://example.com/a").unwrap().short_code;
    index.record_click(&code, visitor("1.1.1.1"));

    index.create_short_url("https://example.com/a").unwrap();
    assert_eq!(index.get_url(&code).unwrap().clicks, 1);
}

#[test]
fn test_equivalent_spellings_share_a_code() {
    let index = UrlIndex::default();
    let a = index.create_short_url("https://Example.com").unwrap();
    let b = index.create_short_url("  https://example.com/ ").unwrap();

    assert_eq!(a.short_code, b.short_code);
    assert_eq!(a.original_url, "https://example.com/");
}

#[test]
fn test_javascript_url_rejected() {
    let index = UrlIndex::default();
    let err = index.create_short_url("javascript:alert(1)").unwrap_err();

    assert!(matches!(err, LinkkeeperError::InvalidUrl(_)));
    assert!(err.is_client_error());
    assert!(index.is_empty());
}

#[test]
fn test_reverse_index_round_trips() {
    let index = UrlIndex::default();
    for i in 0..50 {
        index
            .create_short_url(&format!("https://example.org/{}", i))
            .unwrap();
    }

    for summary in index.get_all_urls() {
        let record = index.get_original_url(&summary.short_code).unwrap();
        assert_eq!(
            index.lookup_code(&record.original_url).as_deref(),
            Some(summary.short_code.as_str())
        );
        let again = index.create_short_url(&record.original_url).unwrap();
        assert_eq!(again.short_code, summary.short_code);
    }
}

// =============================================================================
// Lookup / listing
// =============================================================================

#[test]
fn test_unknown_code_not_found() {
    let index = UrlIndex::default();
    assert!(matches!(
        index.get_original_url("nope42"),
        Err(LinkkeeperError::NotFound(_))
    ));
    assert!(index.get_analytics("nope42").is_none());
}

#[test]
fn test_get_all_urls_newest_first() {
    let index = UrlIndex::default();
    let a = index.create_short_url("https://a.example").unwrap().short_code;
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = index.create_short_url("https://b.example").unwrap().short_code;
    std::thread::sleep(std::time::Duration::from_millis(2));
    let c = index.create_short_url("https://c.example").unwrap().short_code;

    let order: Vec<String> = index
        .get_all_urls()
        .into_iter()
        .map(|u| u.short_code)
        .collect();
    assert_eq!(order, vec![c, b, a]);
}

// =============================================================================
// Clicks
// =============================================================================

#[test]
fn test_click_scenario() {
    let index = UrlIndex::default();
    let k1 = index.create_short_url("https://example.com/a").unwrap();
    let again = index.create_short_url("https://example.com/a").unwrap();
    assert_eq!(again.short_code, k1.short_code);
    assert!(again.existing_url);

    for ip in ["10.1.1.1", "10.1.1.2", "10.1.1.3"] {
        assert!(index.record_click(&k1.short_code, visitor(ip)));
    }

    assert_eq!(index.get_url(&k1.short_code).unwrap().clicks, 3);
    let analytics = index.get_analytics(&k1.short_code).unwrap();
    assert_eq!(analytics.total_clicks, 3);
    assert_eq!(analytics.recent_clicks, 3);
    assert_eq!(analytics.daily_clicks, 3);
    assert_eq!(analytics.history.len(), 3);
}

#[test]
fn test_click_on_unknown_code_leaves_stats_unchanged() {
    let index = UrlIndex::default();
    let code = index.create_short_url("https://example.com").unwrap().short_code;
    index.record_click(&code, visitor("1.1.1.1"));
    let before = index.get_system_stats();

    assert!(!index.record_click("doesnotexist", visitor("1.1.1.1")));
    assert!(!index.record_click("", RawRequestInfo::default()));

    assert_eq!(index.get_system_stats(), before);
}

#[test]
fn test_raw_request_info_is_resolved() {
    let index = UrlIndex::default();
    let code = index.create_short_url("https://example.com").unwrap().short_code;

    index.record_click(
        &code,
        RawRequestInfo {
            peer_addr: Some("10.0.0.1:5555".to_string()),
            forwarded_for: Some("203.0.113.10, 10.0.0.1".to_string()),
            real_ip: None,
            user_agent: None,
        },
    );

    let event = &index.get_analytics(&code).unwrap().history[0];
    assert_eq!(event.source_address, "203.0.113.10");
    assert_eq!(event.client_agent, "");
}

#[test]
fn test_system_stats_counts_recent() {
    let index = UrlIndex::default();
    let a = index.create_short_url("https://a.example").unwrap().short_code;
    let b = index.create_short_url("https://b.example").unwrap().short_code;
    index.record_click(&a, visitor("1.1.1.1"));
    index.record_click(&a, visitor("1.1.1.2"));
    index.record_click(&b, visitor("1.1.1.3"));

    let stats = index.get_system_stats();
    assert_eq!(stats.total_urls, 2);
    assert_eq!(stats.total_clicks, 3);
    assert_eq!(stats.recent_urls, 2);
    assert_eq!(stats.recent_clicks, 3);

    let tomorrow = chrono::Utc::now() + chrono::Duration::hours(25);
    let later = index.get_system_stats_at(tomorrow);
    assert_eq!(later.recent_urls, 0);
    assert_eq!(later.recent_clicks, 0);
    assert_eq!(later.total_clicks, 3);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_creates_and_clicks_stay_consistent() {
    let index = Arc::new(UrlIndex::default());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let index = index.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    // 每个线程都会创建一部分相同的 URL
                    let url = format!("https://example.com/{}", i % 50 + (t % 2) * 50);
                    let code = index.create_short_url(&url).unwrap().short_code;
                    index.record_click(&code, visitor("192.0.2.1"));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = index.get_system_stats();
    assert_eq!(stats.total_urls, 100);
    assert_eq!(stats.total_clicks, 800);

    let codes: HashSet<String> = index
        .get_all_urls()
        .into_iter()
        .map(|u| u.short_code)
        .collect();
    assert_eq!(codes.len(), 100);
}
