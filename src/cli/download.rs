//! Command-line surface and the `download` command

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::api::config::{DEFAULT_API_BASE, DEFAULT_PAGE_SIZE};
use crate::api::{ApiConfig, VimeoApi};
use crate::downloader::progress::format_bytes;
use crate::downloader::{DownloadEngine, LoggingProgress, ProgressSink, TransferConfig};
use crate::orchestrator::{Orchestrator, OrchestratorOptions, RunSummary};
use crate::retry::RetryPolicy;

use super::tree::TreeArgs;
use super::CliError;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./vimeo_backup";

/// Output format for the end-of-run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Vimeo archiver CLI
#[derive(Parser, Debug)]
#[command(name = "vimeo-archiver")]
#[command(about = "Back up every video of a Vimeo account, mirroring its folder tree", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Personal access token with the public, private and video_files scopes
    #[arg(long, global = true, env = "VIMEO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API host
    #[arg(long, global = true, env = "VIMEO_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Maximum attempts for failed requests and transfers (default: 5, range: 1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Summary format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every video, mirroring the folder tree on disk
    Download(DownloadArgs),

    /// Print the folder tree with its videos
    Tree(TreeArgs),
}

/// Arguments for the `download` command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Output directory
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub out: PathBuf,

    /// Replace files that already exist
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Only download videos that sit in folders
    #[arg(long, default_value_t = false)]
    pub folders_only: bool,

    /// Items per listing page (range: 1-100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,
}

impl Cli {
    /// Access token, trimmed; a configuration error when missing or blank.
    pub fn require_token(&self) -> Result<&str, CliError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                CliError::Configuration(
                    "missing access token: pass --token or set VIMEO_TOKEN".to_string(),
                )
            })
    }

    /// API settings from the global flags.
    pub fn api_config(&self, page_size: u32) -> Result<ApiConfig, CliError> {
        Ok(ApiConfig::new(self.require_token()?)
            .with_base_url(self.api_base.as_str())
            .with_page_size(page_size)
            .with_retry_policy(RetryPolicy::listing().with_max_attempts(self.max_retries)))
    }

    /// Transfer settings from the global flags.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig::default()
            .with_retry_policy(RetryPolicy::transfer().with_max_attempts(self.max_retries))
    }
}

impl DownloadArgs {
    /// Run a full archive pass.
    pub async fn execute(&self, cli: &Cli) -> Result<RunSummary, CliError> {
        let config = cli.api_config(self.page_size)?;
        let api = VimeoApi::new(config.clone())?;
        let progress = ProgressMode::detect();
        let engine = DownloadEngine::new(&config, cli.transfer_config())?
            .with_progress(progress.sink());

        let options = OrchestratorOptions::new(&self.out)
            .with_overwrite(self.overwrite)
            .with_folders_only(self.folders_only);

        info!(
            out = %self.out.display(),
            overwrite = self.overwrite,
            folders_only = self.folders_only,
            progress = ?progress,
            "Starting archive run"
        );

        let summary = Orchestrator::new(&api, &engine, options).run().await?;

        match cli.output_format {
            OutputFormat::Json => println!("{}", summary_json(&self.out, &summary)),
            OutputFormat::Human => print_summary(&self.out, &summary),
        }
        Ok(summary)
    }
}

/// Summary as a single JSON line
fn summary_json(out: &Path, summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "success": summary.failed == 0,
        "output_dir": out.display().to_string(),
        "folders_visited": summary.folders_visited,
        "downloaded": summary.downloaded,
        "skipped_existing": summary.skipped_existing,
        "skipped_duplicate": summary.skipped_duplicate,
        "skipped_no_rendition": summary.skipped_no_rendition,
        "failed": summary.failed,
        "bytes_transferred": summary.bytes_transferred,
    })
}

fn print_summary(out: &Path, summary: &RunSummary) {
    println!("\nDone.");
    println!("Output: {}", out.display());
    println!("Folders visited: {}", summary.folders_visited);
    println!(
        "Downloaded: {} ({})",
        summary.downloaded,
        format_bytes(summary.bytes_transferred)
    );
    println!("Skipped (already on disk): {}", summary.skipped_existing);
    if summary.skipped_no_rendition > 0 {
        println!("Skipped (no downloadable file): {}", summary.skipped_no_rendition);
    }
    if summary.failed > 0 {
        eprintln!("Failed: {}", summary.failed);
    }
}

// ─── Progress bar ────────────────────────────────────────────────────────────

/// How transfer progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Live indicatif bars
    Bar,
    /// Periodic log lines, for redirected or captured stderr
    Log,
}

impl ProgressMode {
    /// Bars when stderr can draw them, log lines otherwise.
    pub fn detect() -> Self {
        Self::for_stderr(!ProgressDrawTarget::stderr().is_hidden())
    }

    /// Mode for a stderr that can (`true`) or cannot draw bars.
    pub fn for_stderr(drawable: bool) -> Self {
        if drawable {
            ProgressMode::Bar
        } else {
            ProgressMode::Log
        }
    }

    /// Sink implementing this mode.
    pub fn sink(self) -> Arc<dyn ProgressSink> {
        match self {
            ProgressMode::Bar => Arc::new(BarProgress::default()),
            ProgressMode::Log => Arc::new(LoggingProgress::new()),
        }
    }
}

/// indicatif byte bar, one per transfer; hidden when stderr is not a terminal
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

fn create_progress_bar(label: &str, already_present: u64, total: Option<u64>) -> ProgressBar {
    let pb = match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    };
    pb.set_position(already_present);
    pb.set_message(label.to_string());
    pb
}

impl ProgressSink for BarProgress {
    fn start(&self, label: &str, already_present: u64, total: Option<u64>) {
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(create_progress_bar(label, already_present, total));
        }
    }

    fn advance(&self, bytes: u64) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(bar) = bar.as_ref() {
                bar.inc(bytes);
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
        }
    }
}
