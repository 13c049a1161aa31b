//! lzc-dtl - docker-compose to LazyCat converter
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use lzc_dtl::cli::{Cli, Commands, LogFormat};
use lzc_dtl::config::ConfigManager;
use lzc_dtl::error::DtlResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DtlResult<()> {
    let cli = Cli::parse();

    // 0 = warn (spinners only), 1 = info, 2+ = debug; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("lzc_dtl=warn"),
        1 => EnvFilter::new("lzc_dtl=info"),
        _ => EnvFilter::new("lzc_dtl=debug"),
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match cli.log_format {
        LogFormat::Text => subscriber.without_time().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Convert(args) => lzc_dtl::cli::commands::convert(*args, &config_manager).await,
        Commands::Config(args) => lzc_dtl::cli::commands::config(args, &config_manager).await,
        Commands::Cache(args) => lzc_dtl::cli::commands::cache(args).await,
        Commands::Completions { shell } => {
            lzc_dtl::cli::commands::completions(shell);
            Ok(())
        }
    }
}
