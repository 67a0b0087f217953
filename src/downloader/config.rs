//! Download configuration constants

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Connect timeout for file requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Read timeout for file requests. Large files on slow CDNs need the headroom.
pub const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size for file writes (1 MiB)
pub const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Settings for the file transfer engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Attempt ceiling and linear backoff
    pub retry: RetryPolicy,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for any single read of the body
    pub read_timeout: Duration,
}

impl TransferConfig {
    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::transfer(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }
}
