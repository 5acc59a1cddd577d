//! Serve mode
//!
//! Restores the latest snapshot, runs the memory governor and backup timers,
//! and writes a final snapshot on Ctrl+C.

use anyhow::Result;
use tracing::info;

use crate::config::StaticConfig;
use crate::runtime::lifetime;

pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let ctx = lifetime::prepare_server_startup(config).await?;

    let stats = ctx.index.get_system_stats();
    info!(
        "Serving {} urls ({} total clicks), backups in {}",
        stats.total_urls,
        stats.total_clicks,
        ctx.backup.dir().display()
    );

    lifetime::listen_for_shutdown(&ctx, config.backup.enabled).await;
    info!("Shutdown complete");
    Ok(())
}
