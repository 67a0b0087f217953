//! Observability metrics for archive runs
//!
//! Counters and histograms are emitted through the `metrics` facade at all
//! times. They only become visible when a Prometheus listener is installed
//! with [`init_metrics`]; otherwise recording is a no-op.
//!
//! ## Metrics
//!
//! - `http_requests_total{status}` - API requests by status (or `network_error`)
//! - `http_429_errors_total` - rate-limited API responses
//! - `http_retries_total{kind}` - retries by source (`listing`, `transfer`)
//! - `assets_processed_total{outcome}` - per-video outcomes
//! - `download_bytes_total` - bytes written to disk
//! - `download_duration_seconds` - wall time per file transfer

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Address of the installed exporter, set once per process
static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter and register metric descriptions.
///
/// Idempotent: later calls are ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the Vimeo API"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_counter!(
        "assets_processed_total",
        Unit::Count,
        "Videos processed, labelled by outcome"
    );
    describe_counter!(
        "download_bytes_total",
        Unit::Bytes,
        "Bytes written to local files"
    );
    describe_histogram!(
        "download_duration_seconds",
        Unit::Seconds,
        "Duration of a single file transfer"
    );

    let _ = METRICS_ADDR.set(addr);
    info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

/// Whether an exporter has been installed in this process.
pub fn is_initialized() -> bool {
    METRICS_ADDR.get().is_some()
}

/// Timing and status bookkeeping for one API request
pub struct RequestMetrics {
    endpoint: String,
    attempt: u32,
    start_time: Instant,
}

impl RequestMetrics {
    /// Start recording a request.
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            attempt,
            start_time: Instant::now(),
        }
    }

    /// Record a response with a status code.
    pub fn record_complete(&self, status_code: u16) {
        counter!("http_requests_total", "status" => status_code.to_string()).increment(1);

        if status_code == 429 {
            counter!("http_429_errors_total").increment(1);
        }

        debug!(
            endpoint = %self.endpoint,
            status = status_code,
            attempt = self.attempt,
            duration_ms = self.start_time.elapsed().as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a request that produced no response.
    pub fn record_network_error(&self) {
        counter!("http_requests_total", "status" => "network_error").increment(1);

        warn!(
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Network error recorded"
        );
    }
}

/// Source of a retry, used as the `kind` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Paginated API read
    Listing,
    /// File transfer
    Transfer,
}

impl RetryKind {
    fn as_str(self) -> &'static str {
        match self {
            RetryKind::Listing => "listing",
            RetryKind::Transfer => "transfer",
        }
    }
}

/// Record one retry and the backoff that precedes it.
pub fn record_retry(kind: RetryKind, backoff: Duration) {
    counter!("http_retries_total", "kind" => kind.as_str()).increment(1);
    debug!(
        kind = kind.as_str(),
        backoff_ms = backoff.as_millis(),
        "Retry backoff recorded"
    );
}

/// Record the outcome of one video (`downloaded`, `skipped_existing`, ...).
pub fn record_asset_outcome(outcome: &'static str) {
    counter!("assets_processed_total", "outcome" => outcome).increment(1);
}

/// Record bytes written during a transfer.
pub fn record_bytes(bytes: u64) {
    counter!("download_bytes_total").increment(bytes);
}

/// Record how long a file transfer took, retries included.
pub fn record_transfer_duration(duration: Duration) {
    histogram!("download_duration_seconds").record(duration.as_secs_f64());
}
