//! Resumable, retrying file transfer
//!
//! Bytes stream into `<dest>.part` and the file is renamed to `dest` only once
//! it is complete, so a file at `dest` is always a finished download.
//!
//! Every attempt starts by checking the size of the `.part` file. Bytes already
//! on disk are requested with `Range: bytes=<n>-`; a `206` appends to the file,
//! a `200` means the server ignored the range and the file is rewritten from
//! scratch. A `416` on a resumed request means the partial file no longer
//! matches the remote object, so it is deleted and the next attempt starts
//! from zero. A `.part` left behind by a failed run is resumed by the next one.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::ffi::OsString;
use std::time::Instant;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::api::ApiConfig;
use crate::downloader::config::{TransferConfig, WRITE_BUFFER_SIZE};
use crate::downloader::progress::{NoProgress, ProgressSink};
use crate::downloader::{DownloadError, FileTransfer, TransferOutcome};
use crate::metrics::{self, RetryKind};
use crate::retry::{self, FailureKind, Retryable};

/// `<dest>.part`, where bytes land until the transfer completes.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Per-file bookkeeping across attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadState {
    /// Final destination, written by rename on success
    pub dest: PathBuf,
    /// In-progress file that attempts write to
    pub part: PathBuf,
    /// Bytes in the `.part` file at the last check
    pub present: u64,
    /// Expected final size, when the server announced one
    pub total: Option<u64>,
    /// Attempts started so far
    pub attempts: u32,
    /// Bytes received across all attempts
    pub transferred: u64,
    /// Whether any attempt appended to existing bytes
    pub resumed: bool,
}

impl DownloadState {
    /// State for a destination that has not been checked yet.
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        let dest = dest.into();
        Self {
            part: partial_path(&dest),
            dest,
            present: 0,
            total: None,
            attempts: 0,
            transferred: 0,
            resumed: false,
        }
    }

    /// Re-read the size of the `.part` file (0 if it does not exist).
    pub async fn refresh(&mut self) -> io::Result<u64> {
        self.present = match tokio::fs::metadata(&self.part).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        Ok(self.present)
    }

    fn outcome(&self) -> TransferOutcome {
        TransferOutcome {
            path: self.dest.clone(),
            bytes_written: self.transferred,
            total_size: self.present,
            attempts: self.attempts,
            resumed: self.resumed,
        }
    }
}

/// Production [`FileTransfer`] over HTTP
pub struct DownloadEngine {
    client: Client,
    config: TransferConfig,
    progress: Arc<dyn ProgressSink>,
}

impl DownloadEngine {
    /// Build an engine sending the same auth headers as API requests.
    pub fn new(api: &ApiConfig, config: TransferConfig) -> Result<Self, DownloadError> {
        let headers = api
            .default_headers()
            .map_err(|e| DownloadError::InvalidConfig(e.to_string()))?;
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| DownloadError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            config,
            progress: Arc::new(NoProgress),
        })
    }

    /// Report bytes to `progress` instead of discarding them.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Settings this engine was built with.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    async fn attempt(
        &self,
        link: &str,
        state: &mut DownloadState,
        label: &str,
    ) -> Result<(), DownloadError> {
        state.refresh().await?;

        let mut request = self.client.get(link);
        if state.present > 0 {
            debug!(path = %state.part.display(), offset = state.present, "Resuming partial file");
            request = request.header(RANGE, format!("bytes={}-", state.present));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && state.present > 0 {
            warn!(
                path = %state.part.display(),
                offset = state.present,
                "Server rejected resume offset (416), discarding partial file"
            );
            tokio::fs::remove_file(&state.part).await?;
            state.present = 0;
            return Err(DownloadError::RangeNotSatisfiable);
        }

        let append = match status {
            StatusCode::PARTIAL_CONTENT if state.present > 0 => true,
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {
                if state.present > 0 {
                    debug!(path = %state.part.display(), "Server ignored range, rewriting file");
                }
                false
            }
            other => {
                return Err(DownloadError::Status {
                    status: other.as_u16(),
                    url: link.to_string(),
                })
            }
        };

        let base = if append { state.present } else { 0 };
        state.total = response.content_length().map(|len| base + len);
        state.resumed |= append;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&state.part)
            .await?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut on_disk = base;

        self.progress.start(label, on_disk, state.total);

        let mut body = response.bytes_stream();
        let streamed = loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    if let Err(e) = writer.write_all(&chunk).await {
                        break Err(DownloadError::Io(e));
                    }
                    let len = chunk.len() as u64;
                    on_disk += len;
                    state.transferred += len;
                    self.progress.advance(len);
                    metrics::record_bytes(len);
                }
                Some(Err(e)) => break Err(DownloadError::Network(e.to_string())),
                None => break Ok(()),
            }
        };

        // Keep whatever arrived so the next attempt can resume from it.
        writer.flush().await?;
        state.present = on_disk;
        streamed?;

        if let Some(total) = state.total {
            if on_disk < total {
                return Err(DownloadError::Network(format!(
                    "connection closed after {on_disk} of {total} bytes"
                )));
            }
        }

        Ok(())
    }

    async fn run(&self, link: &str, state: &mut DownloadState) -> Result<(), DownloadError> {
        let policy = self.config.retry;
        let label = state
            .dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| state.dest.display().to_string());

        loop {
            state.attempts += 1;
            let result = self.attempt(link, state, &label).await;
            self.progress.finish();

            let error = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            let kind = classify(&error);
            if !policy.should_retry(&error, state.attempts) {
                retry::log_give_up(&label, kind, state.attempts, &error.to_string());
                return Err(DownloadError::AttemptsExhausted {
                    attempts: state.attempts,
                    last_error: error.to_string(),
                });
            }

            let backoff = policy.delay_for(state.attempts);
            retry::log_retry(&label, kind, state.attempts, &policy, backoff);
            metrics::record_retry(RetryKind::Transfer, backoff);
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl FileTransfer for DownloadEngine {
    async fn fetch(&self, link: &str, dest: &Path) -> Result<TransferOutcome, DownloadError> {
        let started = Instant::now();
        let mut state = DownloadState::new(dest);

        let result = self.run(link, &mut state).await;
        metrics::record_transfer_duration(started.elapsed());

        result?;
        tokio::fs::rename(&state.part, &state.dest).await?;
        info!(
            path = %dest.display(),
            bytes = state.present,
            attempts = state.attempts,
            resumed = state.resumed,
            "Transfer complete"
        );
        Ok(state.outcome())
    }
}

fn classify(error: &DownloadError) -> FailureKind {
    match error {
        DownloadError::RangeNotSatisfiable => FailureKind::StaleRange,
        DownloadError::Status { status, .. } => StatusCode::from_u16(*status)
            .map(FailureKind::from_status)
            .unwrap_or(FailureKind::Network),
        _ => FailureKind::Network,
    }
}
