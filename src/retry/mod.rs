//! Retry policy shared by listing reads and file transfers
//!
//! Both the API client and the download engine decide "try again or give up"
//! through a [`RetryPolicy`]. The policy owns the attempt ceiling and the
//! backoff shape; the error type decides whether it is retryable at all via
//! the [`Retryable`] trait.

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Maximum attempts for both listing reads and file transfers.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Initial exponential backoff for listing reads.
pub const LISTING_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Cap for exponential listing backoff.
pub const LISTING_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// Linear backoff step for file transfers (wait = step * attempt).
pub const TRANSFER_BACKOFF_STEP: Duration = Duration::from_secs(5);

/// Cap for linear transfer backoff.
pub const TRANSFER_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Classifies an error as transient (worth retrying) or not.
pub trait Retryable {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

/// Shape of the wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `initial * 2^(attempt-1)`, capped at `max`
    Exponential {
        /// Wait after the first failure
        initial: Duration,
        /// Upper bound for any single wait
        max: Duration,
    },
    /// `step * attempt`, capped at `max`
    Linear {
        /// Increment per failed attempt
        step: Duration,
        /// Upper bound for any single wait
        max: Duration,
    },
}

impl Backoff {
    /// Wait after the `attempt`-th failure (1-based; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt - 1);
                initial.saturating_mul(factor).min(max)
            }
            Backoff::Linear { step, max } => step.saturating_mul(attempt).min(max),
        }
    }
}

/// Attempt ceiling plus backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    /// Wait between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy from its parts.
    pub const fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy for paginated listing reads: exponential 1s..20s, 5 attempts.
    pub const fn listing() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Backoff::Exponential {
                initial: LISTING_INITIAL_BACKOFF,
                max: LISTING_MAX_BACKOFF,
            },
        )
    }

    /// Policy for file transfers: linear 5s steps capped at 60s, 5 attempts.
    pub const fn transfer() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Backoff::Linear {
                step: TRANSFER_BACKOFF_STEP,
                max: TRANSFER_MAX_BACKOFF,
            },
        )
    }

    /// A policy that never sleeps. Useful for tests and dry runs.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(
            max_attempts,
            Backoff::Linear {
                step: Duration::ZERO,
                max: Duration::ZERO,
            },
        )
    }

    /// Override the attempt ceiling (clamped to at least one attempt).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Wait after the `attempt`-th failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// `failures` is the number of failed attempts so far, including this one.
    pub fn should_retry<E: Retryable + ?Sized>(&self, error: &E, failures: u32) -> bool {
        error.is_retryable() && failures < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::listing()
    }
}

/// What went wrong on a failed attempt, as shown in retry log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request or body read timed out
    Timeout,
    /// Connect or DNS failure
    Offline,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    Server(u16),
    /// HTTP 416 on a resumed transfer
    StaleRange,
    /// HTTP 401 or 403
    Auth(u16),
    /// Any other 4xx
    Client(u16),
    /// Body did not decode
    Malformed,
    /// Anything else on the wire
    Network,
}

impl FailureKind {
    /// Kind for an HTTP status that ended an attempt.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth(status.as_u16()),
            416 => Self::StaleRange,
            429 => Self::RateLimited,
            code if status.is_server_error() => Self::Server(code),
            code if status.is_client_error() => Self::Client(code),
            _ => Self::Network,
        }
    }

    /// Kind for a transport error raised by reqwest.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Offline
        } else if err.is_decode() {
            Self::Malformed
        } else {
            Self::Network
        }
    }

    /// Next step for the user once retries are spent.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Timeout | Self::Offline | Self::Network => {
                "check network connectivity and run again"
            }
            Self::RateLimited => "wait a few minutes before running again",
            Self::Server(_) => "Vimeo may be having trouble, try again later",
            Self::StaleRange => "remove the .part file and run again",
            Self::Auth(_) => "check the token has the public, private and video_files scopes",
            Self::Client(_) => "file links expire, a new run fetches fresh ones",
            Self::Malformed => "the API returned an unexpected body, try again later",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Offline => f.write_str("connection failed"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::Server(code) => write!(f, "server error {code}"),
            Self::StaleRange => f.write_str("stale partial file"),
            Self::Auth(code) => write!(f, "not authorized ({code})"),
            Self::Client(code) => write!(f, "client error {code}"),
            Self::Malformed => f.write_str("malformed response"),
            Self::Network => f.write_str("network error"),
        }
    }
}

/// Log that `resource` failed its `failures`-th attempt and will be tried again after `wait`.
pub fn log_retry(
    resource: &str,
    kind: FailureKind,
    failures: u32,
    policy: &RetryPolicy,
    wait: Duration,
) {
    warn!(
        resource,
        attempt = failures,
        max_attempts = policy.max_attempts,
        wait_secs = wait.as_secs_f64(),
        "{kind}, retrying"
    );
}

/// Log that `resource` is abandoned after `failures` attempts.
pub fn log_give_up(resource: &str, kind: FailureKind, failures: u32, last_error: &str) {
    warn!(
        resource,
        attempts = failures,
        last_error,
        hint = kind.hint(),
        "{kind}, giving up"
    );
}
