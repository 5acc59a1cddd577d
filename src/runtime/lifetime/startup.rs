use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::config::StaticConfig;
use crate::governor::MemoryGovernor;
use crate::shortener::UrlIndex;

pub struct StartupContext {
    pub index: Arc<UrlIndex>,
    pub governor: Arc<MemoryGovernor>,
    pub backup: Arc<BackupManager>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// 构建索引、governor 和备份管理器，并从最新快照恢复
///
/// 不启动后台任务，CLI 子命令也会用到
pub fn build_components(config: &StaticConfig) -> Result<StartupContext> {
    config.validate().context("Invalid configuration")?;

    let index = Arc::new(UrlIndex::from_config(config));
    let governor = Arc::new(MemoryGovernor::new(index.clone(), config.governor.clone()));
    let backup = Arc::new(BackupManager::new(index.clone(), config.backup.clone()));

    // 快照缺失或损坏都不会中断启动
    backup.restore_on_boot();

    Ok(StartupContext {
        index,
        governor,
        backup,
        tasks: Vec::new(),
    })
}

/// 准备 serve 模式：恢复数据并启动后台任务
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let mut ctx = build_components(config)?;

    if config.governor.enabled {
        ctx.tasks.push(ctx.governor.clone().spawn_background_task());
    } else {
        warn!("Memory governor is disabled in configuration");
    }

    if config.backup.enabled {
        ctx.tasks.push(ctx.backup.clone().spawn_background_task());
    } else {
        warn!("Periodic backup is disabled in configuration");
    }

    info!(
        "Startup completed in {:?} with {} urls loaded",
        start_time.elapsed(),
        ctx.index.len()
    );
    Ok(ctx)
}
