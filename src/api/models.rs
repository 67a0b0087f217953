//! Payload shapes returned by the Vimeo API
//!
//! Every listing endpoint answers with the same envelope: a `data` array and an
//! optional `paging.next` continuation. Folder payloads embed their parent in
//! `metadata.connections.parent_folder`, which the API returns as an object, a
//! list, or not at all. [`Linkage`] absorbs that ambiguity once, at decode
//! time, and [`RawFolder::parent_id`] turns it into a plain optional id.

use serde::Deserialize;
use serde_json::Value;

use crate::hierarchy::extract_id;

/// Envelope of a paginated listing response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    /// Items on this page
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    /// Continuation information
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl Page {
    /// Items on this page (empty when `data` is missing or null).
    pub fn into_items(self) -> Vec<Value> {
        self.data.unwrap_or_default()
    }

    /// Continuation reference, if any. Empty strings count as absent.
    pub fn next_reference(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|paging| paging.next.as_deref())
            .filter(|next| !next.trim().is_empty())
    }
}

/// `paging` object of a listing response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    /// Next page reference, absolute URL or API-relative path
    #[serde(default)]
    pub next: Option<String>,
}

/// A field the API returns either as one object or as a list of objects
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Linkage<T> {
    /// List form; only the first element is meaningful
    Many(Vec<T>),
    /// Single object form
    One(T),
    /// Anything else (string, number, list of non-objects)
    Malformed(Value),
}

/// Result of collapsing a [`Linkage`]
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget<T> {
    /// One usable element
    Present(T),
    /// An empty list
    Empty,
    /// Present but neither an object nor a list of objects
    Unreadable,
}

impl<T> Linkage<T> {
    /// Collapse to the single meaningful element.
    pub fn resolve(self) -> LinkTarget<T> {
        match self {
            Linkage::Many(items) => match items.into_iter().next() {
                Some(item) => LinkTarget::Present(item),
                None => LinkTarget::Empty,
            },
            Linkage::One(item) => LinkTarget::Present(item),
            Linkage::Malformed(_) => LinkTarget::Unreadable,
        }
    }
}

/// Reference to a parent folder
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParentRef {
    /// Parent folder URI
    #[serde(default)]
    pub uri: Option<String>,
    /// Parent folder name
    #[serde(default)]
    pub name: Option<String>,
}

/// `metadata.connections` of a folder
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FolderConnections {
    /// Parent folder link in any of its shapes
    #[serde(default)]
    pub parent_folder: Option<Linkage<ParentRef>>,
}

/// `metadata` of a folder
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FolderMetadata {
    /// Connections in any of their shapes
    #[serde(default)]
    pub connections: Option<Linkage<FolderConnections>>,
}

/// A folder item from `/me/projects`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFolder {
    /// Folder URI
    #[serde(default)]
    pub uri: Option<String>,
    /// Folder name
    #[serde(default)]
    pub name: Option<String>,
    /// Metadata carrying the parent link
    #[serde(default)]
    pub metadata: Option<FolderMetadata>,
}

/// Marker id for a parent link that is present but unreadable.
pub const UNKNOWN_ID: &str = "?";

impl RawFolder {
    /// Decode a folder item; unreadable items decode to an empty folder.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Normalized parent identifier.
    ///
    /// - no connections / no parent link / empty list / no `uri` -> `None`
    /// - object or first list element with a `uri` -> `Some(id)`
    /// - a link that is present but neither object nor list -> `Some("?")`
    pub fn parent_id(&self) -> Option<String> {
        let connections = self.metadata.as_ref()?.connections.clone()?;
        let connections = match connections.resolve() {
            LinkTarget::Present(connections) => connections,
            LinkTarget::Empty => return None,
            LinkTarget::Unreadable => return Some(UNKNOWN_ID.to_string()),
        };
        let parent = match connections.parent_folder?.resolve() {
            LinkTarget::Present(parent) => parent,
            LinkTarget::Empty => return None,
            LinkTarget::Unreadable => return Some(UNKNOWN_ID.to_string()),
        };
        parent
            .uri
            .filter(|uri| !uri.is_empty())
            .map(|uri| extract_id(Some(&uri)))
    }
}

/// `metadata.connections.folders.total` of a video; zero or absent means the
/// video is not filed in any folder.
pub fn folder_membership_count(video: &Value) -> u64 {
    let folders = video
        .pointer("/metadata/connections/folders")
        .unwrap_or(&Value::Null);
    folders
        .get("total")
        .and_then(Value::as_u64)
        .filter(|total| *total > 0)
        .or_else(|| folders.get("totalCount").and_then(Value::as_u64))
        .unwrap_or(0)
}

/// Account profile from `/me`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}
