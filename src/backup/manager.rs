//! 定时快照备份
//!
//! - 在索引锁内复制数据，锁外写文件
//! - `latest` 指针文件记录最新快照的文件名（写临时文件后 rename）
//! - 超过保留数量的旧快照会被删除
//! - 启动时从 `latest` 恢复；指针缺失或损坏时依次尝试较新的可读快照，
//!   都失败才以空索引启动

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::snapshot::{Snapshot, write_atomic};
use crate::config::BackupConfig;
use crate::errors::{LinkkeeperError, Result};
use crate::governor::MIN_TASK_INTERVAL;
use crate::shortener::{ImportSummary, UrlIndex};

pub const POINTER_FILE: &str = "latest";
const SNAPSHOT_PREFIX: &str = "snapshot-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// 单次备份的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub file_name: String,
    pub urls: usize,
    pub bytes: usize,
    pub pruned: usize,
}

#[derive(Debug, Default)]
struct BackupState {
    last_started: Option<Instant>,
    last_success_at: Option<DateTime<Utc>>,
}

pub struct BackupManager {
    index: Arc<UrlIndex>,
    config: BackupConfig,
    state: Mutex<BackupState>,
    /// 防止两个备份同时写目录
    running: tokio::sync::Mutex<()>,
}

impl BackupManager {
    pub fn new(index: Arc<UrlIndex>, config: BackupConfig) -> Self {
        Self {
            index,
            config,
            state: Mutex::new(BackupState::default()),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        Path::new(&self.config.dir)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    pub fn last_backup_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_success_at
    }

    /// 距离上次成功备份不足一个周期时返回 true
    fn is_debounced(&self) -> bool {
        self.state
            .lock()
            .last_started
            .is_some_and(|at| at.elapsed() < self.interval())
    }

    /// Takes a snapshot and writes it to the backup directory.
    ///
    /// Returns `Ok(None)` when skipped by the debounce (`force` bypasses it).
    pub async fn run_backup(&self, force: bool) -> Result<Option<BackupReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Backup already in progress, skipping");
            return Ok(None);
        };

        if !force && self.is_debounced() {
            debug!("Backup skipped, last backup is more recent than the interval");
            return Ok(None);
        }

        let started = Instant::now();
        let snapshot = self.index.export_data();
        let dir = self.dir().to_path_buf();
        let retention = self.config.retention;

        let report = tokio::task::spawn_blocking(move || {
            persist_snapshot(&dir, &snapshot, retention)
        })
        .await
        .map_err(|e| LinkkeeperError::persistence(format!("Backup task panicked: {}", e)))??;

        self.mark_success(started);
        info!(
            "Backup written: {} ({} urls, {} bytes, {} old snapshots pruned)",
            report.file_name, report.urls, report.bytes, report.pruned
        );
        Ok(Some(report))
    }

    /// Blocking variant of [`run_backup`](Self::run_backup) that always writes.
    pub fn backup_now(&self) -> Result<BackupReport> {
        let started = Instant::now();
        let snapshot = self.index.export_data();
        let report = persist_snapshot(self.dir(), &snapshot, self.config.retention)?;
        self.mark_success(started);
        Ok(report)
    }

    fn mark_success(&self, started: Instant) {
        let mut state = self.state.lock();
        state.last_started = Some(started);
        state.last_success_at = Some(Utc::now());
    }

    /// 读取 `latest` 指向的快照并导入
    ///
    /// 没有指针文件时返回 `Ok(None)`
    pub fn restore_latest(&self) -> Result<Option<ImportSummary>> {
        let pointer = self.dir().join(POINTER_FILE);
        if !pointer.exists() {
            return Ok(None);
        }

        let file_name = std::fs::read_to_string(&pointer)?;
        let file_name = file_name.trim();
        if !is_snapshot_name(file_name) {
            return Err(LinkkeeperError::persistence(format!(
                "Pointer file {} holds an invalid snapshot name '{}'",
                pointer.display(),
                file_name
            )));
        }

        let snapshot = Snapshot::read_from(self.dir().join(file_name))?;
        let summary = self.index.import_data(snapshot)?;
        Ok(Some(summary))
    }

    /// 启动时恢复，任何失败都只记录日志
    ///
    /// `latest` 不可用时从新到旧尝试目录中的其他快照，避免后续备份
    /// 用空索引覆盖指针并把旧的好快照清理掉
    pub fn restore_on_boot(&self) -> Option<ImportSummary> {
        match self.restore_latest() {
            Ok(Some(summary)) => {
                info!(
                    "Restored {} urls from {}",
                    summary.urls,
                    self.dir().display()
                );
                return Some(summary);
            }
            Ok(None) => {
                debug!("No pointer file in {}", self.dir().display());
            }
            Err(e) => {
                error!("Failed to restore the latest snapshot: {}", e);
            }
        }

        match self.restore_newest_readable() {
            Some((path, summary)) => {
                warn!(
                    "Restored {} urls from fallback snapshot {}",
                    summary.urls,
                    path.display()
                );
                Some(summary)
            }
            None => {
                info!(
                    "No usable snapshot found in {}, starting with an empty index",
                    self.dir().display()
                );
                None
            }
        }
    }

    /// 从新到旧导入第一个可读的快照
    fn restore_newest_readable(&self) -> Option<(PathBuf, ImportSummary)> {
        let files = match self.list_snapshots() {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list snapshots in {}: {}", self.dir().display(), e);
                return None;
            }
        };

        for path in files.into_iter().rev() {
            match Snapshot::read_from(&path).and_then(|snapshot| self.index.import_data(snapshot)) {
                Ok(summary) => return Some((path, summary)),
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }
        None
    }

    /// 快照文件列表，从旧到新
    pub fn list_snapshots(&self) -> Result<Vec<PathBuf>> {
        list_snapshots(self.dir())
    }

    /// 手动导出到任意路径，返回导出的短码数量
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let snapshot = self.index.export_data();
        let count = snapshot.urls.len();
        snapshot.write_to(path.as_ref())?;
        info!("Exported {} urls to {}", count, path.as_ref().display());
        Ok(count)
    }

    pub fn import_from_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportSummary> {
        let snapshot = Snapshot::read_from(path.as_ref())?;
        self.index.import_data(snapshot)
    }

    /// 启动后台备份任务
    pub fn spawn_background_task(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.interval().max(MIN_TASK_INTERVAL);
        info!(
            "Backup background task started (interval: {}s, dir: {})",
            interval.as_secs(),
            self.dir().display()
        );

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = self.run_backup(false).await {
                    // 单次失败不影响服务，下个周期重试
                    error!("Backup cycle failed: {}", e);
                }
            }
        })
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX)
        && name.ends_with(SNAPSHOT_SUFFIX)
        && !name.contains(['/', '\\'])
        && name != ".."
}

fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        SNAPSHOT_PREFIX,
        at.format("%Y%m%dT%H%M%S%.3fZ"),
        SNAPSHOT_SUFFIX
    )
}

fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(is_snapshot_name)
        })
        .map(|entry| entry.path())
        .collect();
    // 文件名中的时间戳可以直接按字典序排序
    files.sort();
    Ok(files)
}

/// 写快照、更新指针、清理旧快照
fn persist_snapshot(dir: &Path, snapshot: &Snapshot, retention: usize) -> Result<BackupReport> {
    std::fs::create_dir_all(dir).map_err(|e| {
        LinkkeeperError::persistence(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let file_name = snapshot_file_name(snapshot.timestamp);
    let bytes = snapshot.write_to(dir.join(&file_name))?;
    write_atomic(&dir.join(POINTER_FILE), file_name.as_bytes())?;

    let pruned = prune_snapshots(dir, retention, &file_name)?;

    Ok(BackupReport {
        file_name,
        urls: snapshot.urls.len(),
        bytes,
        pruned,
    })
}

fn prune_snapshots(dir: &Path, retention: usize, keep: &str) -> Result<usize> {
    let files = list_snapshots(dir)?;
    let excess = files.len().saturating_sub(retention.max(1));

    let mut pruned = 0;
    for path in files.into_iter().take(excess) {
        if path.file_name().and_then(|n| n.to_str()) == Some(keep) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => pruned += 1,
            Err(e) => warn!("Failed to remove old snapshot {}: {}", path.display(), e),
        }
    }
    if pruned > 0 {
        debug!("Pruned {} old snapshots", pruned);
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_names_sort_chronologically() {
        let a = snapshot_file_name(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        let b = snapshot_file_name(Utc.with_ymd_and_hms(2026, 11, 2, 3, 4, 5).unwrap());
        assert_eq!(a, "snapshot-20260102T030405.000Z.json");
        assert!(a < b);
        assert!(is_snapshot_name(&a));
    }

    #[test]
    fn test_pointer_names_are_validated() {
        assert!(!is_snapshot_name("../etc/passwd"));
        assert!(!is_snapshot_name("snapshot-x/../../y.json"));
        assert!(!is_snapshot_name("latest"));
    }
}
