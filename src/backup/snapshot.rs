//! 快照格式
//!
//! 正向索引、分析数据、反向索引分别存成 (key, value) 列表，
//! 附带格式版本和生成时间。

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsBucket;
use crate::errors::{LinkkeeperError, Result};
use crate::shortener::ShortUrlRecord;

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub urls: Vec<(String, ShortUrlRecord)>,
    pub analytics: Vec<(String, AnalyticsBucket)>,
    pub reverse_index: Vec<(String, String)>,
}

impl Snapshot {
    pub fn new(
        urls: Vec<(String, ShortUrlRecord)>,
        analytics: Vec<(String, AnalyticsBucket)>,
        reverse_index: Vec<(String, String)>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now(),
            urls,
            analytics,
            reverse_index,
        }
    }

    /// 只接受主版本号相同的快照
    pub fn check_version(&self) -> Result<()> {
        let major = |v: &str| v.split('.').next().unwrap_or_default().to_string();
        if major(&self.version) != major(SNAPSHOT_VERSION) {
            return Err(LinkkeeperError::serialization(format!(
                "Unsupported snapshot version '{}' (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }

    /// Same content, ignoring when the snapshot was taken.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.urls == other.urls
            && self.analytics == other.analytics
            && self.reverse_index == other.reverse_index
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            LinkkeeperError::persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&bytes)
    }

    /// 先写临时文件再 rename，返回写入的字节数
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let bytes = self.to_json()?;
        write_atomic(path, &bytes)?;
        Ok(bytes.len())
    }
}

/// 写入 `<path>.tmp` 后 rename 到目标路径
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(|e| {
        LinkkeeperError::persistence(format!("Failed to write {}: {}", tmp.display(), e))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        LinkkeeperError::persistence(format!(
            "Failed to move {} to {}: {}",
            tmp.display(),
            path.display(),
            e
        ))
    })?;
    Ok(())
}
