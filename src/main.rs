use clap::Parser;

use linkkeeper::cli::{Cli, Commands};
use linkkeeper::config::StaticConfig;
use linkkeeper::runtime::modes::{run_cli_command, run_server};
use linkkeeper::system::init_logging;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = StaticConfig::load(&cli.config);

    // 日志 guard 需要保持到程序结束
    let _guard = init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_server(&config))
        }
        cmd => {
            if let Err(e) = run_cli_command(&config, cmd) {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
