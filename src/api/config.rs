//! Vimeo API configuration
//!
//! Endpoints, field selections, and client settings live here so the HTTP
//! client and the typed API wrapper carry no hard-coded strings.

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};

use crate::api::{ApiError, ApiResult};
use crate::retry::RetryPolicy;

/// Production API host
pub const DEFAULT_API_BASE: &str = "https://api.vimeo.com";

/// Accept header pinning the API version
pub const API_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";

/// Page size for download runs
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Page size for the tree command, which fetches only names
pub const TREE_PAGE_SIZE: u32 = 100;

/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Wait applied on 429 when `Retry-After` is missing or unparseable
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Consecutive 429 responses tolerated for one request before giving up
pub const MAX_RATE_LIMIT_WAITS: u32 = 100;

/// Hard cap on pages followed for one listing
pub const MAX_PAGES: usize = 10_000;

/// Timeout for a single API request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Folder listing endpoint
pub const FOLDERS_ENDPOINT: &str = "/me/projects";

/// Whole-account video listing endpoint
pub const VIDEOS_ENDPOINT: &str = "/me/videos";

/// Account profile endpoint
pub const ME_ENDPOINT: &str = "/me";

/// Fields needed to rebuild the folder tree
pub const FOLDER_FIELDS: &str =
    "uri,name,metadata.connections.parent_folder.uri,metadata.connections.parent_folder.name";

/// Fields needed to pick and download a rendition
pub const VIDEO_FIELDS: &str = "uri,name,files,download";

/// Fields needed to print a video in the tree
pub const VIDEO_NAME_FIELDS: &str = "uri,name";

/// Fields needed to tell whether a video is filed in any folder
pub const UNFILED_VIDEO_FIELDS: &str = "uri,name,metadata.connections.folders.total";

/// Connection settings for the Vimeo API
#[derive(Clone)]
pub struct ApiConfig {
    /// API host, without trailing slash
    pub base_url: String,
    /// Personal access token
    pub token: String,
    /// `per_page` sent with the first page of every listing
    pub page_size: u32,
    /// Retry policy for transient listing failures
    pub retry: RetryPolicy,
    /// Timeout for a single request
    pub request_timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
}

impl ApiConfig {
    /// Configuration for the production API with default settings.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::listing(),
            request_timeout: REQUEST_TIMEOUT,
            user_agent: format!("vimeo-archiver/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the page size, clamped to 1..=100.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Override the listing retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Headers sent with every API and file request.
    pub fn default_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("bearer {}", self.token))
            .map_err(|_| ApiError::InvalidConfig("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|_| ApiError::InvalidConfig("invalid user agent".into()))?,
        );
        Ok(headers)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
