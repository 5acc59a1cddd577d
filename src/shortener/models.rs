use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrlRecord {
    pub short_code: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub click_count: u64,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// 插入顺序，created_at 相同时用于确定先后
    #[serde(default)]
    pub sequence: u64,
}

impl ShortUrlRecord {
    /// Sort key for "oldest created first".
    pub fn age_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

/// Result of `create_short_url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateResult {
    pub short_code: String,
    pub original_url: String,
    /// true 表示该 URL 之前已经有短码，返回的是已有记录
    pub existing_url: bool,
}

/// 列表 / 详情接口返回的精简记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSummary {
    pub short_code: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub clicks: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl From<&ShortUrlRecord> for UrlSummary {
    fn from(record: &ShortUrlRecord) -> Self {
        Self {
            short_code: record.short_code.clone(),
            original_url: record.original_url.clone(),
            created_at: record.created_at,
            clicks: record.click_count,
            last_accessed_at: record.last_accessed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub total_urls: usize,
    pub total_clicks: u64,
    /// 24 小时内创建的短码数
    pub recent_urls: usize,
    /// 24 小时内的点击数（从保留的历史中统计）
    pub recent_clicks: u64,
}

/// Result of `import_data`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub urls: usize,
    pub buckets: usize,
    /// 因重复 URL 或孤立 bucket 被丢弃的条目
    pub dropped: usize,
}
