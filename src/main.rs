//! Main entry point for the vimeo-archiver CLI

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vimeo_archiver::cli::{Cli, CliError, Commands};

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // LOG_FORMAT=json switches to structured output
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vimeo_archiver=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        match vimeo_archiver::metrics::init_metrics(addr) {
            Ok(()) => info!(%addr, "Prometheus exporter listening"),
            Err(e) => error!("Failed to start metrics exporter: {}", e),
        }
    }

    let result: Result<(), CliError> = match cli.command {
        Commands::Download(ref args) => args.execute(&cli).await.map(|_| ()),
        Commands::Tree(ref args) => args.execute(&cli).await,
    };

    if let Err(e) = result {
        let code = e.exit_code();
        let e = anyhow::Error::new(e);
        error!("Command failed: {:#}", e);
        std::process::exit(code);
    }
}
