//! 内存清理
//!
//! 每个周期最多运行一次：
//! 1. 距离上次清理不足一个周期则跳过
//! 2. 截断每个 bucket 的访问历史，删除过期的按天计数，裁剪 IP / UA 计数表
//! 3. 短码数量超过上限时按创建时间淘汰最旧的（记录、反向索引、bucket 一起删除）
//! 4. 记录本次清理时间

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GovernorConfig;
use crate::shortener::UrlIndex;

/// 后台任务的最小周期
pub(crate) const MIN_TASK_INTERVAL: Duration = Duration::from_secs(1);

/// 清理报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 被截断历史的 bucket 数量
    pub histories_trimmed: usize,
    /// 丢弃的访问记录数
    pub events_dropped: usize,
    /// 删除的按天计数条目
    pub daily_entries_dropped: usize,
    /// 裁剪掉的 IP / UA 计数条目
    pub signal_entries_dropped: usize,
    /// 被淘汰的短码数
    pub urls_evicted: usize,
}

/// 内存使用统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_urls: usize,
    pub total_history_entries: usize,
    pub total_daily_entries: usize,
    pub tracked_ips: usize,
    pub tracked_agents: usize,
    pub estimated_bytes: usize,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub sweeps_run: u64,
    pub urls_evicted_total: u64,
}

#[derive(Debug, Default)]
struct GovernorState {
    last_sweep: Option<Instant>,
    last_sweep_at: Option<DateTime<Utc>>,
    sweeps_run: u64,
    urls_evicted_total: u64,
}

pub struct MemoryGovernor {
    index: Arc<UrlIndex>,
    config: GovernorConfig,
    state: Mutex<GovernorState>,
}

impl MemoryGovernor {
    pub fn new(index: Arc<UrlIndex>, config: GovernorConfig) -> Self {
        Self {
            index,
            config,
            state: Mutex::new(GovernorState::default()),
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    /// Runs a sweep unless one ran less than an interval ago.
    pub fn maybe_sweep(&self) -> Option<SweepReport> {
        {
            // 检查和占位在同一次加锁内完成，并发调用只有一个能通过
            let mut state = self.state.lock();
            if state
                .last_sweep
                .is_some_and(|at| at.elapsed() < self.interval())
            {
                debug!("Memory sweep skipped, last sweep is more recent than the interval");
                return None;
            }
            state.last_sweep = Some(Instant::now());
        }
        Some(self.sweep_at(Utc::now()))
    }

    /// 忽略周期限制，立即清理
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();

        self.index.with_state(|state| {
            for bucket in state.analytics.values_mut() {
                let dropped = bucket.truncate_history(self.config.history_retention);
                if dropped > 0 {
                    report.histories_trimmed += 1;
                    report.events_dropped += dropped;
                }
                report.daily_entries_dropped +=
                    bucket.prune_daily_counts(now, self.config.daily_retention_days);
                if let Some(signals) = bucket.security_signals.as_mut() {
                    report.signal_entries_dropped +=
                        signals.trim(self.config.max_tracked_sources);
                }
            }

            let excess = state.urls.len().saturating_sub(self.config.max_urls);
            if excess > 0 {
                for code in state.codes_oldest_first().into_iter().take(excess) {
                    if state.remove(&code).is_some() {
                        report.urls_evicted += 1;
                    }
                }
            }
        });

        {
            let mut state = self.state.lock();
            state.last_sweep = Some(started);
            state.last_sweep_at = Some(now);
            state.sweeps_run += 1;
            state.urls_evicted_total += report.urls_evicted as u64;
        }

        if report.urls_evicted > 0 {
            warn!(
                "Memory sweep evicted {} urls (capacity {})",
                report.urls_evicted, self.config.max_urls
            );
        }
        info!(
            "Memory sweep completed: {} histories trimmed ({} events), {} daily entries dropped, {} signal entries dropped, {} urls evicted in {:?}",
            report.histories_trimmed,
            report.events_dropped,
            report.daily_entries_dropped,
            report.signal_entries_dropped,
            report.urls_evicted,
            started.elapsed()
        );
        report
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let mut stats = self.index.with_state(|state| {
            let mut stats = MemoryStats {
                total_urls: state.urls.len(),
                ..MemoryStats::default()
            };
            for bucket in state.analytics.values() {
                stats.total_history_entries += bucket.history.len();
                stats.total_daily_entries += bucket.daily_counts.len();
                if let Some(signals) = &bucket.security_signals {
                    stats.tracked_ips += signals.ip_counts.len();
                    stats.tracked_agents += signals.agent_counts.len();
                }
                stats.estimated_bytes += bucket.estimated_bytes();
            }
            stats.estimated_bytes += state
                .urls
                .values()
                .map(|r| {
                    // 正向 + 反向索引各存一份 code 和 url
                    std::mem::size_of_val(r) + 2 * (r.short_code.len() + r.original_url.len())
                })
                .sum::<usize>();
            stats
        });

        let state = self.state.lock();
        stats.last_sweep_at = state.last_sweep_at;
        stats.sweeps_run = state.sweeps_run;
        stats.urls_evicted_total = state.urls_evicted_total;
        stats
    }

    /// 启动后台清理任务
    pub fn spawn_background_task(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.interval().max(MIN_TASK_INTERVAL);
        info!(
            "Memory governor started (interval: {}s, capacity: {} urls)",
            interval.as_secs(),
            self.config.max_urls
        );

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                self.maybe_sweep();
            }
        })
    }
}
