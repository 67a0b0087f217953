//! CLI error types and conversions

use crate::api::ApiError;
use crate::downloader::DownloadError;
use crate::orchestrator::OrchestratorError;
use crate::output::OutputError;

/// Exit code for failed runs
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for invalid configuration (missing token, bad flags)
pub const EXIT_CONFIGURATION: i32 = 2;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Download engine error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Output error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Run aborted
    #[error("run aborted: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration(_)
            | CliError::Api(ApiError::InvalidConfig(_))
            | CliError::Download(DownloadError::InvalidConfig(_)) => EXIT_CONFIGURATION,
            _ => EXIT_FAILURE,
        }
    }
}
