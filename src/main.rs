//! Chatplay console binary
//!
//! Reads chat lines (`name: message`) from stdin, routes them through the
//! engine and prints replies to stdout. Logs go to stderr.

use chatplay::{
    common::config::{generate_sample_config, ConfigLoader},
    config::LogFormat,
    errors::BotResult,
    logging, ConsoleTransport, ServiceBuilder,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;

/// Chat game & economy engine
#[derive(Parser)]
#[command(name = "chatplay")]
#[command(about = "Chat games, wagers and giveaways for a live-stream channel")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the JSON stores
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level for chatplay targets (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    /// Seed the game RNGs for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Write a sample configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chatplay: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> BotResult<()> {
    if let Some(path) = &cli.generate_config {
        generate_sample_config(path)?;
        println!("Sample configuration written to {}", path.display());
        return Ok(());
    }

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    // CLI options override file and environment
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_directory = data_dir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.log_json {
        config.logging.format = LogFormat::Json;
    }

    logging::init(&config.logging)?;

    tracing::info!(
        channel = %config.channel.channel_name,
        data_dir = %config.storage.data_directory.display(),
        "Starting chatplay"
    );

    let transport = ConsoleTransport::from_config(&config.console);
    let mut builder = ServiceBuilder::new(config);
    if let Some(seed) = cli.seed {
        builder = builder.with_seed(seed);
    }
    let services = builder.build()?;
    let router = services.router();

    let handled = transport.run(BufReader::new(tokio::io::stdin()), &router).await?;

    // Let running games and wager timers finish before exiting
    services.scheduler().drain().await;

    let metrics = services.metrics();
    tracing::info!(handled, "Console session finished");
    tracing::debug!("\n{}", metrics.to_prometheus_format());

    Ok(())
}
