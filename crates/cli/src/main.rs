mod cli;
mod commands;
mod request;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ferry_core::Config;
use ferry_rules::Resolver;

use crate::cli::{CliArgs, Command, LogFormat};

fn init_tracing(debug: bool, format: LogFormat) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    ferry_core::config::load_dotenv();
    let args = CliArgs::parse();
    init_tracing(args.debug, args.log_format);

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config.log_summary();

    match args.command {
        Command::Run { shutdown_timeout } => {
            commands::run(&config, Duration::from_secs(shutdown_timeout)).await
        }
        Command::Batch { queue } => commands::batch(&config, queue).await,
        Command::Check => {
            let resolver = Resolver::from_config(&config).context("invalid rules")?;
            let stdin = std::io::stdin();
            commands::check(&resolver, stdin.lock(), std::io::stdout().lock())
        }
        Command::Request { files } => commands::request(&config, &files).await,
    }
}
