use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessEvent, SecurityAssessment, SecuritySignals};
use crate::config::AnalyticsConfig;

pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// 日期 key，UTC
pub fn day_key(at: DateTime<Utc>) -> String {
    at.format(DAY_KEY_FORMAT).to_string()
}

/// Per-code analytics aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBucket {
    /// 按时间顺序，最旧的在前
    #[serde(default)]
    pub history: VecDeque<AccessEvent>,
    #[serde(default)]
    pub daily_counts: BTreeMap<String, u64>,
    /// 0-23 点
    #[serde(default)]
    pub hourly_counts: BTreeMap<u8, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_signals: Option<SecuritySignals>,
}

impl AnalyticsBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次访问，返回安全信号是否被触发
    ///
    /// 历史按时间戳有序插入，超过 `history_limit` 时丢弃时间最早的记录
    pub fn record(&mut self, event: AccessEvent, config: &AnalyticsConfig) -> bool {
        let at = DateTime::from_timestamp_millis(event.timestamp).unwrap_or_else(Utc::now);

        *self.daily_counts.entry(day_key(at)).or_insert(0) += 1;
        *self.hourly_counts.entry(at.hour() as u8).or_insert(0) += 1;

        let flagged = self
            .security_signals
            .get_or_insert_with(SecuritySignals::default)
            .observe(
                &event.source_address,
                &event.client_agent,
                config.ip_flag_threshold,
                config.agent_flag_threshold,
            );

        // 时间戳相同的保持到达顺序
        let pos = self
            .history
            .partition_point(|e| e.timestamp <= event.timestamp);
        self.history.insert(pos, event);
        self.truncate_history(config.history_limit);

        flagged
    }

    /// 按时间戳重新排序，用于导入外部快照
    pub fn sort_history(&mut self) {
        self.history
            .make_contiguous()
            .sort_by_key(|e| e.timestamp);
    }

    /// 只保留最近的 `keep` 条记录，返回丢弃的条数
    pub fn truncate_history(&mut self, keep: usize) -> usize {
        let excess = self.history.len().saturating_sub(keep);
        if excess > 0 {
            self.history.drain(..excess);
        }
        excess
    }

    /// 删除早于 `now - retention_days` 的按天计数，返回删除的条数
    ///
    /// 无法解析的日期 key 也一并删除
    pub fn prune_daily_counts(&mut self, now: DateTime<Utc>, retention_days: u32) -> usize {
        let cutoff = (now - Duration::days(retention_days as i64)).date_naive();
        let before = self.daily_counts.len();
        self.daily_counts.retain(|key, _| {
            NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).is_ok_and(|date| date >= cutoff)
        });
        before - self.daily_counts.len()
    }

    /// 在保留的历史中统计 `window` 内的访问次数
    ///
    /// 历史有上限，高流量短码的统计只覆盖仍保留的记录
    pub fn clicks_within(&self, now: DateTime<Utc>, window: Duration) -> u64 {
        let since = (now - window).timestamp_millis();
        let until = now.timestamp_millis();
        self.history
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= until)
            .count() as u64
    }

    pub fn clicks_on_day(&self, now: DateTime<Utc>) -> u64 {
        self.daily_counts.get(&day_key(now)).copied().unwrap_or(0)
    }

    pub fn assess(&self) -> SecurityAssessment {
        self.security_signals
            .as_ref()
            .map(SecuritySignals::assess)
            .unwrap_or_default()
    }

    /// 粗略估算占用的字节数，用于内存统计
    pub fn estimated_bytes(&self) -> usize {
        let history: usize = self
            .history
            .iter()
            .map(|e| {
                std::mem::size_of::<AccessEvent>()
                    + e.source_address.len()
                    + e.client_agent.len()
                    + e.session_id.as_ref().map_or(0, String::len)
            })
            .sum();
        let daily = self.daily_counts.len() * (std::mem::size_of::<u64>() + 10);
        let hourly = self.hourly_counts.len() * std::mem::size_of::<(u8, u64)>();
        let signals = self.security_signals.as_ref().map_or(0, |s| {
            s.ip_counts.keys().map(|k| k.len() + 8).sum::<usize>()
                + s.agent_counts.keys().map(|k| k.len() + 8).sum::<usize>()
        });
        std::mem::size_of::<Self>() + history + daily + hourly + signals
    }
}
