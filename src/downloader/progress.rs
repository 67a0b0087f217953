//! Progress reporting for file transfers.
//!
//! The engine reports bytes through a [`ProgressSink`]. The CLI plugs in an
//! indicatif bar when stderr is a terminal and [`LoggingProgress`] when it is
//! redirected; library callers get nothing at all from [`NoProgress`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);

/// Receives progress events for one transfer at a time.
pub trait ProgressSink: Send + Sync {
    /// A transfer begins. `already_present` bytes are on disk from a previous
    /// attempt; `total` is the expected final size when known.
    fn start(&self, label: &str, already_present: u64, total: Option<u64>);

    /// `bytes` more were written to disk.
    fn advance(&self, bytes: u64);

    /// The transfer ended, successfully or not.
    fn finish(&self);
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _label: &str, _already_present: u64, _total: Option<u64>) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}

/// Byte counters for a single transfer.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// What is being transferred
    pub label: String,
    /// Bytes on disk, including those present before the transfer started
    pub bytes_on_disk: u64,
    /// Bytes received during this transfer
    pub bytes_transferred: u64,
    /// Expected final size, if known
    pub total: Option<u64>,
    /// When the transfer started
    pub start_time: Instant,
    /// Last time progress was reported
    pub last_update: Instant,
    /// Minimum interval between reports
    pub update_interval: Duration,
}

impl ProgressState {
    /// Fresh state for a transfer.
    pub fn new(label: impl Into<String>, already_present: u64, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            bytes_on_disk: already_present,
            bytes_transferred: 0,
            total,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }

    /// Account for newly written bytes.
    pub fn update(&mut self, bytes: u64) {
        self.bytes_on_disk = self.bytes_on_disk.saturating_add(bytes);
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes);
    }

    /// Completion percentage (0-100), when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.bytes_on_disk as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Receive rate in bytes per second.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.bytes_transferred as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Estimate remaining time from the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let total = self.total?;
        let rate = self.rate();
        let remaining = total.saturating_sub(self.bytes_on_disk);
        if rate > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        }
    }

    /// Whether enough time passed since the last report.
    pub fn should_emit_update(&self) -> bool {
        self.bytes_transferred > 0 && self.last_update.elapsed() >= self.update_interval
    }

    /// Reset the report timer.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] {} {}",
            self.label,
            format_bytes(self.bytes_on_disk)
        )];

        if let Some(total) = self.total {
            parts.push(format!("of {}", format_bytes(total)));
        }

        if let Some(pct) = self.percentage() {
            parts.push(format!("- {pct:.1}% complete"));
        }

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {}/s", format_bytes(rate as u64)));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Emits a log line every 30 seconds while a transfer runs.
#[derive(Debug, Default)]
pub struct LoggingProgress {
    state: Mutex<Option<ProgressState>>,
}

impl LoggingProgress {
    /// Create a sink with no active transfer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LoggingProgress {
    fn start(&self, label: &str, already_present: u64, total: Option<u64>) {
        if let Ok(mut state) = self.state.lock() {
            *state = Some(ProgressState::new(label, already_present, total));
        }
    }

    fn advance(&self, bytes: u64) {
        let Ok(mut guard) = self.state.lock() else {
            return;
        };
        if let Some(state) = guard.as_mut() {
            state.update(bytes);
            if state.should_emit_update() {
                info!("{}", state.format_progress());
                state.mark_emitted();
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = None;
        }
    }
}

/// `1.5 MiB`-style byte formatting.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
