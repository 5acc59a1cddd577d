//! 安全信号
//!
//! 统计单个短码下每个 IP / User-Agent 的出现次数。某个 IP 或 UA 超过阈值后，
//! 之后的每一次访问都会让 `flag_count` 加一。结果只用于展示，不会拦截点击。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// 平均每个 IP 的点击数超过该值视为集中访问
const AVG_CLICKS_PER_IP_LIMIT: f64 = 20.0;
/// 平均每个 UA 的点击数超过该值视为集中访问
const AVG_CLICKS_PER_AGENT_LIMIT: f64 = 30.0;

/// flag_count 每次贡献的分数及其封顶
const FLAG_WEIGHT: u64 = 2;
const FLAG_SCORE_CAP: u64 = 40;
const IP_CONCENTRATION_SCORE: u64 = 30;
const AGENT_CONCENTRATION_SCORE: u64 = 30;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
    AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u64) -> Self {
        match score {
            70.. => RiskLevel::Critical,
            40..=69 => RiskLevel::High,
            15..=39 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

/// 每个 bucket 的安全信号，第一次记录点击时才创建
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySignals {
    pub ip_counts: HashMap<String, u64>,
    pub agent_counts: HashMap<String, u64>,
    pub flag_count: u64,
}

/// 对外展示的评估结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityAssessment {
    pub flag_count: u64,
    pub unique_ips: usize,
    pub unique_agents: usize,
    pub avg_clicks_per_ip: f64,
    pub avg_clicks_per_agent: f64,
    pub risk_score: u64,
    pub risk_level: RiskLevel,
}

impl SecuritySignals {
    /// 记录一次访问，返回本次是否触发了 flag
    pub fn observe(
        &mut self,
        source_address: &str,
        client_agent: &str,
        ip_threshold: u64,
        agent_threshold: u64,
    ) -> bool {
        let ip_count = {
            let count = self.ip_counts.entry(source_address.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let agent_count = {
            let count = self
                .agent_counts
                .entry(client_agent.to_string())
                .or_insert(0);
            *count += 1;
            *count
        };

        let flagged = ip_count > ip_threshold || agent_count > agent_threshold;
        if flagged {
            self.flag_count += 1;
        }
        flagged
    }

    /// IP 和 UA 各只保留计数最高的 `keep` 条，返回删除的条目数
    ///
    /// `flag_count` 不变
    pub fn trim(&mut self, keep: usize) -> usize {
        trim_counts(&mut self.ip_counts, keep) + trim_counts(&mut self.agent_counts, keep)
    }

    pub fn assess(&self) -> SecurityAssessment {
        let unique_ips = self.ip_counts.len();
        let unique_agents = self.agent_counts.len();
        let total: u64 = self.ip_counts.values().sum();

        let avg_clicks_per_ip = average(total, unique_ips);
        let avg_clicks_per_agent = average(total, unique_agents);

        let mut risk_score = (self.flag_count * FLAG_WEIGHT).min(FLAG_SCORE_CAP);
        if avg_clicks_per_ip > AVG_CLICKS_PER_IP_LIMIT {
            risk_score += IP_CONCENTRATION_SCORE;
        }
        if avg_clicks_per_agent > AVG_CLICKS_PER_AGENT_LIMIT {
            risk_score += AGENT_CONCENTRATION_SCORE;
        }

        SecurityAssessment {
            flag_count: self.flag_count,
            unique_ips,
            unique_agents,
            avg_clicks_per_ip,
            avg_clicks_per_agent,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
        }
    }
}

fn trim_counts(counts: &mut HashMap<String, u64>, keep: usize) -> usize {
    let excess = counts.len().saturating_sub(keep);
    if excess == 0 {
        return 0;
    }

    let mut entries: Vec<(String, u64)> = counts.drain().collect();
    // 计数相同时按 key 排序，保证结果稳定
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(keep);
    counts.extend(entries);
    excess
}

fn average(total: u64, buckets: usize) -> f64 {
    if buckets == 0 {
        0.0
    } else {
        total as f64 / buckets as f64
    }
}
