//! 点击分析
//!
//! 每个短码对应一个 [`AnalyticsBucket`]：
//! - 有上限的访问历史（FIFO 淘汰）
//! - 按天 / 按小时的计数汇总
//! - IP / User-Agent 集中度安全信号（仅做提示，不拦截点击）

pub mod bucket;
pub mod security;

pub use bucket::AnalyticsBucket;
pub use security::{RiskLevel, SecurityAssessment, SecuritySignals};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::ip::{UNKNOWN_ADDRESS, resolve_client_ip};

/// 单次访问记录，只存在于 AnalyticsBucket 中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// 毫秒时间戳
    pub timestamp: i64,
    pub source_address: String,
    #[serde(default)]
    pub client_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// 调用方提供的附加数据，原样透传
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// 传输层的原始请求信息，由 HTTP 层直接填充
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRequestInfo {
    pub peer_addr: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// 调用方已经整理好的访问信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedAccessInfo {
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
    pub session_id: Option<String>,
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// Access information handed to `record_click`.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessInfo {
    Raw(RawRequestInfo),
    Enriched(EnrichedAccessInfo),
}

impl Default for AccessInfo {
    fn default() -> Self {
        AccessInfo::Enriched(EnrichedAccessInfo::default())
    }
}

impl From<RawRequestInfo> for AccessInfo {
    fn from(info: RawRequestInfo) -> Self {
        AccessInfo::Raw(info)
    }
}

impl From<EnrichedAccessInfo> for AccessInfo {
    fn from(info: EnrichedAccessInfo) -> Self {
        AccessInfo::Enriched(info)
    }
}

impl AccessInfo {
    /// Resolves either variant into an event stamped at `at`.
    ///
    /// Missing address becomes `"unknown"`, missing agent becomes empty.
    pub fn into_event(self, at: DateTime<Utc>) -> AccessEvent {
        let timestamp = at.timestamp_millis();
        match self {
            AccessInfo::Raw(raw) => AccessEvent {
                timestamp,
                source_address: resolve_client_ip(
                    raw.peer_addr.as_deref(),
                    raw.forwarded_for.as_deref(),
                    raw.real_ip.as_deref(),
                ),
                client_agent: raw.user_agent.unwrap_or_default(),
                session_id: None,
                tags: BTreeMap::new(),
            },
            AccessInfo::Enriched(info) => AccessEvent {
                timestamp,
                source_address: info
                    .source_address
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
                client_agent: info.client_agent.unwrap_or_default(),
                session_id: info.session_id,
                tags: info.tags,
            },
        }
    }
}

/// 单个短码的分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub short_code: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub total_clicks: u64,
    /// 最近一小时（从有上限的历史中统计）
    pub recent_clicks: u64,
    /// 今天（UTC）的点击数，取自按天汇总
    pub daily_clicks: u64,
    pub hourly_counts: BTreeMap<u8, u64>,
    pub daily_counts: BTreeMap<String, u64>,
    pub history: Vec<AccessEvent>,
    pub security: SecurityAssessment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_info_resolution() {
        let at = Utc::now();
        let event = AccessInfo::Raw(RawRequestInfo {
            peer_addr: Some("127.0.0.1:3000".to_string()),
            forwarded_for: Some("203.0.113.5".to_string()),
            real_ip: None,
            user_agent: Some("curl/8.0".to_string()),
        })
        .into_event(at);

        assert_eq!(event.timestamp, at.timestamp_millis());
        assert_eq!(event.source_address, "203.0.113.5");
        assert_eq!(event.client_agent, "curl/8.0");
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_missing_fields_degrade() {
        let event = AccessInfo::default().into_event(Utc::now());
        assert_eq!(event.source_address, "unknown");
        assert_eq!(event.client_agent, "");

        let event = AccessInfo::Raw(RawRequestInfo::default()).into_event(Utc::now());
        assert_eq!(event.source_address, "unknown");
    }

    #[test]
    fn test_enriched_passthrough() {
        let mut tags = BTreeMap::new();
        tags.insert("country".to_string(), serde_json::json!("NL"));
        let event = AccessInfo::Enriched(EnrichedAccessInfo {
            source_address: Some("198.51.100.2".to_string()),
            client_agent: Some("Mozilla/5.0".to_string()),
            session_id: Some("sess-1".to_string()),
            tags: tags.clone(),
        })
        .into_event(Utc::now());

        assert_eq!(event.source_address, "198.51.100.2");
        assert_eq!(event.session_id.as_deref(), Some("sess-1"));
        assert_eq!(event.tags, tags);
    }
}
