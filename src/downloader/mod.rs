//! Resumable file transfer engine
//!
//! # Overview
//!
//! Each selected rendition is streamed to disk by a [`FileTransfer`]
//! implementation. The production one, [`DownloadEngine`], works like this:
//!
//! 1. **Check**: the size of `<dest>.part` decides between a fresh request
//!    and a `Range` request
//! 2. **Request**: `200` writes the `.part` file from scratch, `206` appends
//! 3. **Stream**: chunks are written as they arrive and reported to a
//!    [`ProgressSink`]
//! 4. **Retry**: network failures, bad statuses and stale ranges go back to
//!    step 1 after a linear backoff, keeping whatever is already on disk
//! 5. **Finish**: the complete `.part` file is renamed to the destination
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use vimeo_archiver::api::ApiConfig;
//! use vimeo_archiver::downloader::{DownloadEngine, FileTransfer, TransferConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(&ApiConfig::new("token"), TransferConfig::default())?;
//! let outcome = engine
//!     .fetch("https://player.vimeo.com/play/123.mp4", Path::new("./clip.mp4"))
//!     .await?;
//! println!("{} bytes on disk", outcome.total_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - Network errors, non-2xx statuses and `416` on resume are retried
//! - IO errors on the local file are not
//! - Running out of attempts yields [`DownloadError::AttemptsExhausted`] for
//!   that file only; callers decide whether to continue. The `.part` file
//!   stays behind and the next fetch of the same destination resumes it

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::retry::Retryable;

pub mod config;
pub mod progress;
pub mod transfer;

pub use config::TransferConfig;
pub use progress::{LoggingProgress, NoProgress, ProgressSink, ProgressState};
pub use transfer::{partial_path, DownloadEngine, DownloadState};

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Request failed or the body stream broke
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with an unexpected status
    #[error("HTTP {status} for {url}")]
    Status {
        /// Status code
        status: u16,
        /// Requested link
        url: String,
    },

    /// Server rejected the resume offset; the partial file was removed
    #[error("range not satisfiable, partial file discarded")]
    RangeNotSatisfiable,

    /// Local file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed
    #[error("gave up after {attempts} attempts: {last_error}")]
    AttemptsExhausted {
        /// Attempts made
        attempts: u32,
        /// Message of the last failure
        last_error: String,
    },

    /// HTTP client could not be built
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Retryable for DownloadError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Network(_)
                | DownloadError::Status { .. }
                | DownloadError::RangeNotSatisfiable
        )
    }
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Destination file
    pub path: PathBuf,
    /// Bytes received and written during this call, across all attempts
    pub bytes_written: u64,
    /// Final size of the file on disk
    pub total_size: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Whether any attempt continued from bytes already on disk
    pub resumed: bool,
}

/// Moves the bytes behind a link into a local file.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Download `link` to `dest`, resuming from any bytes in `<dest>.part`.
    async fn fetch(&self, link: &str, dest: &Path) -> Result<TransferOutcome, DownloadError>;
}
