use std::collections::HashSet;

use linkkeeper::utils::ip::resolve_client_ip;
use linkkeeper::utils::url_validator::{UrlValidationError, validation_error_message};
use linkkeeper::utils::{
    DEFAULT_ALPHABET, generate_code_from, generate_random_code, is_valid_url, normalize_url,
    validate_url,
};

// =============================================================================
// 短码生成
// =============================================================================

#[test]
fn test_generate_random_code_length() {
    assert_eq!(generate_random_code(6).len(), 6);
    assert_eq!(generate_random_code(10).len(), 10);
    assert_eq!(generate_random_code(1).len(), 1);
    assert_eq!(generate_random_code(0).len(), 0);
}

#[test]
fn test_generate_random_code_characters() {
    let code = generate_random_code(100);
    let valid_chars: HashSet<char> = DEFAULT_ALPHABET.chars().collect();
    assert_eq!(valid_chars.len(), 62);

    for ch in code.chars() {
        assert!(valid_chars.contains(&ch), "Invalid character: {}", ch);
    }
}

#[test]
fn test_generate_random_code_uniqueness() {
    let mut codes = HashSet::new();

    for _ in 0..1000 {
        codes.insert(generate_random_code(8));
    }

    // 应该生成大量不同的代码
    assert!(
        codes.len() > 990,
        "Generated codes lack sufficient randomness"
    );
}

#[test]
fn test_custom_alphabet_only_uses_its_characters() {
    for length in [1, 5, 8, 12, 20] {
        let code = generate_code_from("xyz123", length);
        assert_eq!(code.len(), length, "Wrong length for {}", length);
        assert!(code.chars().all(|c| "xyz123".contains(c)));
    }
}

#[test]
fn test_single_character_alphabet() {
    assert_eq!(generate_code_from("q", 4), "qqqq");
}

// =============================================================================
// URL 验证
// =============================================================================

#[test]
fn test_valid_urls() {
    assert!(is_valid_url("https://example.com"));
    assert!(is_valid_url("http://example.com/path?q=1#frag"));
    assert!(is_valid_url("  https://example.com  "));
    assert!(!is_valid_url("ftp://example.com"));
    assert!(!is_valid_url("example.com"));
    assert!(!is_valid_url(""));
}

#[test]
fn test_validate_returns_canonical_href() {
    assert_eq!(
        validate_url("HTTPS://Example.COM").unwrap(),
        "https://example.com/"
    );
    assert_eq!(
        validate_url("http://example.com:80/a/../b").unwrap(),
        "http://example.com/b"
    );
}

#[test]
fn test_dangerous_protocols_blocked() {
    for url in [
        "javascript:alert(1)",
        "JavaScript:alert(1)",
        " java\tscript:alert(1)",
        "data:text/html,<script>alert(1)</script>",
        "vbscript:msgbox",
        "file:///etc/passwd",
        "ftp://example.com",
        "about:blank",
        "blob:https://example.com/uuid",
    ] {
        assert!(
            matches!(
                validate_url(url),
                Err(UrlValidationError::DangerousProtocol(_))
            ),
            "{} should be blocked",
            url
        );
    }
}

#[test]
fn test_other_schemes_rejected() {
    assert_eq!(
        validate_url("mailto:someone@example.com"),
        Err(UrlValidationError::InvalidProtocol("mailto:".to_string()))
    );
    assert!(matches!(
        validate_url("not a url"),
        Err(UrlValidationError::InvalidFormat(_))
    ));
    assert_eq!(validate_url("   "), Err(UrlValidationError::EmptyUrl));
}

#[test]
fn test_normalize_url_report() {
    let ok = normalize_url("https://Example.com");
    assert!(ok.valid);
    assert_eq!(ok.url, "https://example.com/");
    assert!(ok.error.is_none());

    let bad = normalize_url(" javascript:void(0) ");
    assert!(!bad.valid);
    assert_eq!(bad.url, "javascript:void(0)");
    assert!(bad.error.unwrap().contains("javascript:"));
}

#[test]
fn test_validation_error_messages() {
    assert_eq!(
        validation_error_message(&UrlValidationError::EmptyUrl),
        "URL cannot be empty"
    );
    assert_eq!(
        validation_error_message(&UrlValidationError::DangerousProtocol("data:".into())),
        "This URL protocol is not allowed"
    );
}

// =============================================================================
// 客户端地址
// =============================================================================

#[test]
fn test_resolve_client_ip() {
    // 公网直连不信任转发头
    assert_eq!(
        resolve_client_ip(Some("203.0.113.5:443"), Some("1.2.3.4"), None),
        "203.0.113.5"
    );
    // 本地代理后面取 X-Forwarded-For 第一个
    assert_eq!(
        resolve_client_ip(Some("127.0.0.1:8080"), Some("1.2.3.4, 10.0.0.1"), None),
        "1.2.3.4"
    );
    assert_eq!(
        resolve_client_ip(Some("[::1]:80"), None, Some("5.6.7.8")),
        "5.6.7.8"
    );
    assert_eq!(resolve_client_ip(None, None, None), "unknown");
}
