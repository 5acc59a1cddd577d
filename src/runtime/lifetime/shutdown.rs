use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::startup::StartupContext;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub async fn listen_for_shutdown(ctx: &StartupContext, final_backup: bool) {
    // 等待 Ctrl+C 信号
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping background tasks...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    perform_shutdown_tasks(ctx, final_backup).await;
}

/// 停止后台任务并写最后一次快照
pub async fn perform_shutdown_tasks(ctx: &StartupContext, final_backup: bool) {
    for task in &ctx.tasks {
        task.abort();
    }

    if !final_backup {
        return;
    }

    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        ctx.backup.run_backup(true),
    )
    .await
    {
        Ok(Ok(Some(report))) => info!("Final backup written: {}", report.file_name),
        Ok(Ok(None)) => warn!("Final backup skipped, another backup was in progress"),
        Ok(Err(e)) => error!("Final backup failed: {}", e),
        Err(_) => error!(
            "Final backup timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
