mod cli;
mod commands;
mod dump;

use anyhow::Result;
use clap::Parser;

use seenkey_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries records and reports.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = Config::from_env();
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(context) = args.context {
        config.storage.context = context;
    }
    config.log_summary();

    match args.command {
        Command::ImportExisting(args) => commands::import_existing(&config, args).await,
        Command::Import(args) => commands::import(&config, args).await,
        Command::Report(args) => commands::report_duplicates(&config, args).await,
        Command::Reset(args) => commands::reset(&config, args.kind),
        Command::Stats(args) => commands::stats(&config, args.kind),
    }
}
