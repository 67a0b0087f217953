//! # Vimeo Archiver Library
//!
//! Backs up every video owned by a Vimeo account to local storage, mirroring
//! the account's folder ("project") tree on disk.
//!
//! ## Features
//!
//! - **Complete enumeration**: walks every folder, then sweeps the account's
//!   full video listing for anything not filed in a folder
//! - **Exactly one copy per video**: a run-wide dedup set keyed by the video
//!   URI, even when a video sits in several folders
//! - **Best rendition**: deterministic choice of the highest-quality direct file
//! - **Resumable transfers**: bytes land in `<file>.part` and `Range` requests
//!   continue them across attempts and runs, with bounded retries and
//!   rate-limit awareness
//! - **Metadata sidecars**: the full API payload is saved next to each file
//!
//! ## Quick Start
//!
//! ```no_run
//! use vimeo_archiver::api::{ApiConfig, VimeoApi};
//! use vimeo_archiver::downloader::{DownloadEngine, TransferConfig};
//! use vimeo_archiver::orchestrator::{Orchestrator, OrchestratorOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::new("my-personal-access-token");
//! let api = VimeoApi::new(config.clone())?;
//! let engine = DownloadEngine::new(&config, TransferConfig::default())?;
//!
//! let summary = Orchestrator::new(&api, &engine, OrchestratorOptions::new("./vimeo_backup"))
//!     .run()
//!     .await?;
//! println!("downloaded {} videos", summary.downloaded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`retry`] - Retry policy shared by listing reads and file transfers
//! - [`api`] - Vimeo API client, cursor pagination, and payload models
//! - [`hierarchy`] - Folder adjacency map built from the flat folder listing
//! - [`selector`] - Rendition selection (pure, no I/O)
//! - [`downloader`] - Resumable, retrying file transfer engine
//! - [`orchestrator`] - Depth-first traversal with run-wide dedup
//! - [`output`] - Filename sanitization and JSON sidecars
//! - [`cli`] - Command-line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CLI command implementations
pub mod cli;

/// Vimeo API access
pub mod api;

/// File transfer engine
pub mod downloader;

/// Folder hierarchy reconstruction
pub mod hierarchy;

/// Observability metrics
pub mod metrics;

/// Traversal and per-video processing
pub mod orchestrator;

/// Output paths and sidecar files
pub mod output;

/// Shared retry policy
pub mod retry;

/// Rendition selection
pub mod selector;

pub use hierarchy::{extract_id, FolderMap};
pub use selector::{select_rendition, SelectedRendition};

/// A folder ("project") in the account's folder tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    /// Folder identifier (last path segment of the URI, `"?"` if missing)
    pub id: String,
    /// Resource reference (e.g. `/users/1/projects/42`)
    pub uri: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Identifier of the parent folder, `None` for top-level folders
    pub parent_id: Option<String>,
}

impl FolderNode {
    /// Display name with whitespace collapsed, or `folder <id>` when missing.
    pub fn display_name(&self) -> String {
        output::path::clean_display_name(self.name.as_deref())
            .unwrap_or_else(|| format!("folder {}", self.id))
    }

    /// Case-insensitive sort key used for sibling ordering.
    pub fn sort_key(&self) -> String {
        output::path::clean_display_name(self.name.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// One encoded file of a video, from the `files` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Media type tag (e.g. `video/mp4`)
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub media_type: Option<String>,
    /// Byte-serving link
    #[serde(default, deserialize_with = "lenient_text")]
    pub link: Option<String>,
    /// Frame height in pixels
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    /// Frame width in pixels
    #[serde(default, deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    /// Bitrate in bits per second
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bitrate: Option<u64>,
    /// Size in bytes as reported by the API
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    /// Quality label (`hd`, `sd`, ...)
    #[serde(default, deserialize_with = "lenient_text")]
    pub quality: Option<String>,
}

/// One entry of the lower-priority `download` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadRendition {
    /// Byte-serving link
    #[serde(default, deserialize_with = "lenient_text")]
    pub link: Option<String>,
    /// Frame height in pixels
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    /// Entry type; `source` or `original` marks the uploaded master
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    /// Quality label
    #[serde(default, deserialize_with = "lenient_text")]
    pub quality: Option<String>,
}

impl DownloadRendition {
    /// Whether this entry is the uploaded master file.
    pub fn is_source(&self) -> bool {
        matches!(self.kind.as_deref(), Some("source") | Some("original"))
    }
}

/// A video as seen in a listing or detail payload
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    /// Resource reference, the run-wide dedup key
    pub uri: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Candidate renditions
    pub files: Vec<Rendition>,
    /// Lower-priority download renditions
    pub download: Vec<DownloadRendition>,
    /// Full payload as received, written to the metadata sidecar
    pub payload: Value,
}

impl AssetRecord {
    /// Decode a video payload. Never fails: rendition entries that are not
    /// objects are dropped, and missing or mistyped fields stay `None`.
    pub fn from_payload(payload: Value) -> Self {
        let text = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let uri = text("uri");
        let name = text("name");
        let files = decode_list::<Rendition>(payload.get("files"));
        let download = decode_list::<DownloadRendition>(payload.get("download"));

        Self {
            uri,
            name,
            files,
            download,
            payload,
        }
    }

    /// Identifier derived from the URI.
    pub fn id(&self) -> String {
        extract_id(self.uri.as_deref())
    }

    /// Name used for the output file before sanitization.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("video_{}", self.id()))
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Non-negative integer from a number, a whole float or a numeric string;
/// `None` for anything else.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// String field; `None` when absent or not a string.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}
