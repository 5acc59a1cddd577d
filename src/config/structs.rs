use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkkeeperError, Result};
use crate::utils::{DEFAULT_ALPHABET, DEFAULT_CODE_LENGTH};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - shortener: 短码长度、字母表、生成重试次数
/// - analytics: 历史上限与安全信号阈值
/// - governor: 内存清理周期与容量上限
/// - backup: 快照周期、目录、保留数量
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StaticConfig {
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：LK，分隔符：__
    /// 示例：LK__BACKUP__INTERVAL_SECS=60
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        use config::{Config, Environment, File};

        let path = path.as_ref();

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::from(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("LK")
                    .separator("__")
                    .try_parsing(true),
            );

        // logging 还没初始化，这里只能用 eprintln
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if path.exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path.display());
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 从 TOML 字符串解析（不读环境变量）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LinkkeeperError::config(e.to_string()))
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LinkkeeperError::config(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// 检查明显不合理的配置
    pub fn validate(&self) -> Result<()> {
        if self.shortener.code_length == 0 {
            return Err(LinkkeeperError::config("shortener.code_length must be > 0"));
        }
        if self.shortener.alphabet.chars().count() < 2 {
            return Err(LinkkeeperError::config(
                "shortener.alphabet must contain at least 2 characters",
            ));
        }
        if self.shortener.max_generation_attempts == 0 {
            return Err(LinkkeeperError::config(
                "shortener.max_generation_attempts must be > 0",
            ));
        }
        if self.analytics.history_limit == 0 {
            return Err(LinkkeeperError::config("analytics.history_limit must be > 0"));
        }
        if self.governor.history_retention == 0 {
            return Err(LinkkeeperError::config(
                "governor.history_retention must be > 0",
            ));
        }
        // 后台任务按周期运行，周期为 0 会变成忙循环
        if self.governor.enabled && self.governor.interval_secs == 0 {
            return Err(LinkkeeperError::config(
                "governor.interval_secs must be > 0 when the governor is enabled",
            ));
        }
        if self.governor.max_tracked_sources == 0 {
            return Err(LinkkeeperError::config(
                "governor.max_tracked_sources must be > 0",
            ));
        }
        if self.backup.enabled && self.backup.interval_secs == 0 {
            return Err(LinkkeeperError::config(
                "backup.interval_secs must be > 0 when backups are enabled",
            ));
        }
        if self.backup.retention == 0 {
            return Err(LinkkeeperError::config("backup.retention must be > 0"));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(LinkkeeperError::config(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// 短码生成配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShortenerConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
    /// 短码冲突时的最大生成次数
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: usize,
}

/// 点击分析配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    /// 每个短码保留的访问记录上限（FIFO）
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// 单个 IP 点击超过该值时累加 flag_count
    #[serde(default = "default_ip_flag_threshold")]
    pub ip_flag_threshold: u64,
    /// 单个 User-Agent 出现超过该值时累加 flag_count
    #[serde(default = "default_agent_flag_threshold")]
    pub agent_flag_threshold: u64,
}

/// 内存清理配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 两次清理之间的最小间隔（秒）
    #[serde(default = "default_governor_interval")]
    pub interval_secs: u64,
    /// 清理时每个短码保留的访问记录数
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,
    #[serde(default = "default_daily_retention_days")]
    pub daily_retention_days: u32,
    /// 短码数量上限，超出时按创建时间淘汰最旧的
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    /// 每个短码保留的 IP / UA 计数条目上限，清理时保留计数最高的
    #[serde(default = "default_max_tracked_sources")]
    pub max_tracked_sources: usize,
}

/// 快照备份配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_backup_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_backup_dir")]
    pub dir: String,
    /// 保留的快照数量
    #[serde(default = "default_backup_retention")]
    pub retention: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default)]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_code_length() -> usize {
    DEFAULT_CODE_LENGTH
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

fn default_max_generation_attempts() -> usize {
    100
}

fn default_history_limit() -> usize {
    1000
}

fn default_ip_flag_threshold() -> u64 {
    50
}

fn default_agent_flag_threshold() -> u64 {
    100
}

fn default_governor_interval() -> u64 {
    30 * 60
}

fn default_history_retention() -> usize {
    2000
}

fn default_daily_retention_days() -> u32 {
    30
}

fn default_max_urls() -> usize {
    50_000
}

fn default_max_tracked_sources() -> usize {
    1000
}

fn default_backup_interval() -> u64 {
    5 * 60
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_backup_retention() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            alphabet: default_alphabet(),
            max_generation_attempts: default_max_generation_attempts(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            ip_flag_threshold: default_ip_flag_threshold(),
            agent_flag_threshold: default_agent_flag_threshold(),
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_governor_interval(),
            history_retention: default_history_retention(),
            daily_retention_days: default_daily_retention_days(),
            max_urls: default_max_urls(),
            max_tracked_sources: default_max_tracked_sources(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_backup_interval(),
            dir: default_backup_dir(),
            retention: default_backup_retention(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: false,
        }
    }
}
