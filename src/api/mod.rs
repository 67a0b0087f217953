//! Vimeo API access
//!
//! [`http::VimeoHttpClient`] performs single authenticated GETs with retry and
//! rate-limit handling, [`pagination::Paginator`] turns a listing endpoint into
//! a lazy item stream, and [`VimeoApi`] exposes the handful of account
//! listings the archiver needs behind the [`CatalogSource`] trait.

use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use serde_json::Value;
use std::pin::Pin;
use tracing::debug;

use crate::retry::Retryable;

pub mod config;
pub mod http;
pub mod models;
pub mod pagination;

pub use config::ApiConfig;
pub use http::VimeoHttpClient;
pub use models::RawFolder;
pub use pagination::Paginator;

use config::{
    FOLDERS_ENDPOINT, FOLDER_FIELDS, ME_ENDPOINT, UNFILED_VIDEO_FIELDS, VIDEOS_ENDPOINT,
    VIDEO_FIELDS, VIDEO_NAME_FIELDS,
};
use models::{folder_membership_count, Account};

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request could not be sent or the body could not be read
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not the expected JSON
    #[error("decode error: {0}")]
    Decode(String),

    /// Token rejected (HTTP 401)
    #[error("unauthorized (401) for {url}: check the access token")]
    Unauthorized {
        /// Request URL
        url: String,
    },

    /// Non-retryable HTTP status
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Request URL
        url: String,
        /// Response body, as text
        body: String,
    },

    /// Transient failures outlasted the retry budget
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Message of the last failure
        last_error: String,
    },

    /// The server kept answering 429
    #[error("still rate limited after {waits} consecutive waits")]
    RateLimitExhausted {
        /// Waits performed
        waits: u32,
    },

    /// A reference could not be turned into a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Continuation links never ended
    #[error("pagination exceeded {limit} pages")]
    TooManyPages {
        /// Page limit
        limit: usize,
    },

    /// Client could not be configured (bad token characters, TLS init failure)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Decode(_))
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Lazy stream of raw listing items
pub type ItemStream<'a> = Pin<Box<dyn Stream<Item = ApiResult<Value>> + Send + 'a>>;

/// Listings the orchestrator needs from the remote catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every folder of the account, flat, in one pass.
    async fn folders(&self) -> ApiResult<Vec<RawFolder>>;

    /// Videos directly inside a folder.
    fn folder_assets(&self, folder_uri: &str) -> ItemStream<'_>;

    /// Every video of the account.
    fn all_assets(&self) -> ItemStream<'_>;

    /// Full payload of one video (`uri,name,files,download`).
    async fn asset_detail(&self, asset_uri: &str) -> ApiResult<Value>;
}

/// Typed access to the Vimeo endpoints used by the archiver
pub struct VimeoApi {
    http: VimeoHttpClient,
}

impl VimeoApi {
    /// Build the API wrapper and its HTTP client.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        Ok(Self {
            http: VimeoHttpClient::new(config)?,
        })
    }

    /// Underlying HTTP client.
    pub fn http(&self) -> &VimeoHttpClient {
        &self.http
    }

    /// Account display name, `None` if the call fails or the name is empty.
    pub async fn account_name(&self) -> Option<String> {
        let query = [("fields", "name".to_string())];
        match self.http.get::<Account>(ME_ENDPOINT, &query).await {
            Ok(account) => account.name.filter(|name| !name.trim().is_empty()),
            Err(e) => {
                debug!(error = %e, "Account name unavailable");
                None
            }
        }
    }

    /// Names and URIs of the videos in a folder.
    pub fn folder_asset_names(&self, folder_uri: &str) -> ItemStream<'_> {
        Paginator::new(&self.http, folder_videos_path(folder_uri))
            .with_fields(VIDEO_NAME_FIELDS)
            .into_stream()
    }

    /// Videos not filed in any folder.
    pub async fn unfiled_assets(&self) -> ApiResult<Vec<Value>> {
        Paginator::new(&self.http, VIDEOS_ENDPOINT)
            .with_fields(UNFILED_VIDEO_FIELDS)
            .into_stream()
            .try_filter(|video| futures_util::future::ready(folder_membership_count(video) == 0))
            .try_collect()
            .await
    }
}

#[async_trait]
impl CatalogSource for VimeoApi {
    async fn folders(&self) -> ApiResult<Vec<RawFolder>> {
        Paginator::new(&self.http, FOLDERS_ENDPOINT)
            .with_fields(FOLDER_FIELDS)
            .into_stream()
            .map_ok(RawFolder::from_value)
            .try_collect()
            .await
    }

    fn folder_assets(&self, folder_uri: &str) -> ItemStream<'_> {
        Paginator::new(&self.http, folder_videos_path(folder_uri))
            .with_fields(VIDEO_FIELDS)
            .into_stream()
    }

    fn all_assets(&self) -> ItemStream<'_> {
        Paginator::new(&self.http, VIDEOS_ENDPOINT)
            .with_fields(VIDEO_FIELDS)
            .into_stream()
    }

    async fn asset_detail(&self, asset_uri: &str) -> ApiResult<Value> {
        let query = [("fields", VIDEO_FIELDS.to_string())];
        self.http.get::<Value>(asset_uri, &query).await
    }
}

fn folder_videos_path(folder_uri: &str) -> String {
    format!("{}/videos", folder_uri.trim_end_matches('/'))
}
