//! CLI mode
//!
//! Offline commands against the snapshot directory.

use std::fmt;
use std::path::Path;

use colored::Colorize;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use crate::errors::LinkkeeperError;
use crate::runtime::lifetime::{StartupContext, build_components};

#[derive(Debug)]
pub enum CliError {
    Core(LinkkeeperError),
    CommandError(String),
}

impl CliError {
    pub fn format_simple(&self) -> String {
        match self {
            CliError::Core(err) => err.format_simple(),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    pub fn format_colored(&self) -> String {
        match self {
            CliError::Core(err) => err.format_colored(),
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<LinkkeeperError> for CliError {
    fn from(err: LinkkeeperError) -> Self {
        CliError::Core(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Core(err.into())
    }
}

/// Run a CLI command from clap-parsed input
pub fn run_cli_command(config: &StaticConfig, cmd: Commands) -> Result<(), CliError> {
    // 配置命令不需要加载快照
    if let Commands::Config { action } = cmd {
        return run_config_command(config, action);
    }

    let ctx = build_components(config).map_err(|e| CliError::CommandError(format!("{:#}", e)))?;
    let mutates = cmd.mutates_index();

    match cmd {
        Commands::Add { url } => {
            let result = ctx.index.create_short_url(&url)?;
            if result.existing_url {
                println!(
                    "{} {} -> {}",
                    "Already shortened:".yellow().bold(),
                    result.short_code.cyan(),
                    result.original_url
                );
            } else {
                println!(
                    "{} {} -> {}",
                    "Created:".green().bold(),
                    result.short_code.cyan(),
                    result.original_url
                );
            }
        }

        Commands::Remove { short_code } => {
            let record = ctx.index.delete_short_url(&short_code)?;
            println!(
                "{} {} ({})",
                "Removed:".green().bold(),
                record.short_code.cyan(),
                record.original_url
            );
        }

        Commands::List { json } => {
            let urls = ctx.index.get_all_urls();
            if json {
                println!("{}", serde_json::to_string_pretty(&urls)?);
            } else if urls.is_empty() {
                println!("{}", "No short codes".dimmed());
            } else {
                for url in urls {
                    println!(
                        "{}  {}  {} clicks  {}",
                        url.short_code.cyan(),
                        url.created_at.format("%Y-%m-%d %H:%M:%S"),
                        url.clicks,
                        url.original_url
                    );
                }
            }
        }

        Commands::Analytics { short_code } => {
            let summary = ctx.index.get_analytics(&short_code).ok_or_else(|| {
                CliError::Core(LinkkeeperError::not_found(format!(
                    "Short code '{}'",
                    short_code
                )))
            })?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Stats => print_stats(&ctx)?,

        Commands::Sweep => {
            let report = ctx.governor.sweep();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Backups => {
            let snapshots = ctx.backup.list_snapshots()?;
            if snapshots.is_empty() {
                println!("{}", "No snapshots".dimmed());
            }
            for path in snapshots {
                println!("{}", path.display());
            }
        }

        Commands::Export { file_path } => match file_path {
            Some(path) => {
                let count = ctx.backup.export_to_file(&path)?;
                println!(
                    "{} {} urls to {}",
                    "Exported".green().bold(),
                    count,
                    path
                );
            }
            None => {
                let bytes = ctx.index.export_data().to_json()?;
                println!("{}", String::from_utf8_lossy(&bytes));
            }
        },

        Commands::Import { file_path } => {
            let summary = ctx.backup.import_from_file(&file_path)?;
            println!(
                "{} {} urls, {} analytics buckets ({} dropped)",
                "Imported".green().bold(),
                summary.urls,
                summary.buckets,
                summary.dropped
            );
        }

        Commands::Serve | Commands::Config { .. } => {
            return Err(CliError::CommandError(
                "command must be handled by the caller".to_string(),
            ));
        }
    }

    if mutates {
        let report = ctx.backup.backup_now()?;
        println!("{} {}", "Snapshot written:".dimmed(), report.file_name);
    }
    Ok(())
}

fn print_stats(ctx: &StartupContext) -> Result<(), CliError> {
    let stats = serde_json::json!({
        "system": ctx.index.get_system_stats(),
        "memory": ctx.governor.memory_stats(),
        "last_backup_at": ctx.backup.last_backup_at(),
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_config_command(config: &StaticConfig, action: ConfigCommands) -> Result<(), CliError> {
    match action {
        ConfigCommands::Generate { output_path, force } => {
            let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());
            if Path::new(&path).exists() && !force {
                return Err(CliError::CommandError(format!(
                    "{} already exists, use --force to overwrite",
                    path
                )));
            }
            StaticConfig::default().save_to_file(&path)?;
            println!("{} {}", "Sample configuration written to".green(), path);
        }
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| CliError::CommandError(e.to_string()))?;
            println!("{}", rendered);
        }
    }
    Ok(())
}
