//! URL 验证模块
//!
//! 验证 URL 安全性，阻止危险协议，并给出规范化后的 href

use serde::Serialize;
use url::Url;

/// URL 验证错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    EmptyUrl,
    InvalidProtocol(String),
    DangerousProtocol(String),
    InvalidFormat(String),
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "URL cannot be empty"),
            Self::InvalidProtocol(proto) => write!(
                f,
                "Invalid protocol: {}. Only http:// and https:// are allowed",
                proto
            ),
            Self::DangerousProtocol(proto) => {
                write!(f, "Dangerous protocol blocked: {}", proto)
            }
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// 危险协议列表
const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "vbscript:",
    "file:",
    "ftp:",
    "about:",
    "blob:",
];

/// Result of [`normalize_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedUrl {
    /// Canonical `href`, or the trimmed input when rejected
    pub url: String,
    pub valid: bool,
    pub error: Option<String>,
}

/// Returns true only for absolute URLs whose scheme is exactly `http` or `https`.
///
/// Never panics; anything unparsable is simply invalid.
pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// 验证 URL 安全性并返回规范化后的 href
///
/// 检查项目：
/// 1. URL 不为空
/// 2. 不是危险协议（javascript:, data:, file: 等），大小写不敏感，在解析之前检查
/// 3. 必须是 http:// 或 https://
/// 4. URL 格式有效
pub fn validate_url(candidate: &str) -> Result<String, UrlValidationError> {
    let url = candidate.trim();

    if url.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    // 去掉控制字符后再比较，避免 "java\tscript:" 之类的绕过
    let url_lower: String = url
        .chars()
        .filter(|c| !c.is_ascii_control() && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    for proto in DANGEROUS_PROTOCOLS {
        if url_lower.starts_with(proto) {
            return Err(UrlValidationError::DangerousProtocol(proto.to_string()));
        }
    }

    let parsed = Url::parse(url).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::InvalidProtocol(format!("{}:", other))),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::InvalidFormat(
            "URL has no host".to_string(),
        ));
    }

    let href: String = parsed.into();
    Ok(href)
}

/// Structured form of [`validate_url`] for callers that want a report instead of a `Result`.
pub fn normalize_url(candidate: &str) -> NormalizedUrl {
    match validate_url(candidate) {
        Ok(url) => NormalizedUrl {
            url,
            valid: true,
            error: None,
        },
        Err(e) => NormalizedUrl {
            url: candidate.trim().to_string(),
            valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// 获取 URL 验证错误的用户友好消息
pub fn validation_error_message(error: &UrlValidationError) -> &'static str {
    match error {
        UrlValidationError::EmptyUrl => "URL cannot be empty",
        UrlValidationError::InvalidProtocol(_) => "URL must start with http:// or https://",
        UrlValidationError::DangerousProtocol(_) => "This URL protocol is not allowed",
        UrlValidationError::InvalidFormat(_) => "Invalid URL format",
    }
}
