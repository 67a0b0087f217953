//! Folder hierarchy reconstruction
//!
//! The folder listing is flat; each item names its parent. [`FolderMap`]
//! groups folders by parent id in a single pass so the traversal never needs
//! to fetch a folder twice, however deep the tree is.

use std::collections::HashMap;

use tracing::debug;

use crate::api::models::{RawFolder, UNKNOWN_ID};
use crate::api::{ApiResult, CatalogSource};
use crate::FolderNode;

/// Last path segment of a resource reference.
///
/// Trailing slashes are ignored. A missing or empty reference yields `"?"`.
pub fn extract_id(reference: Option<&str>) -> String {
    reference
        .map(|r| r.trim().trim_end_matches('/'))
        .and_then(|r| r.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(UNKNOWN_ID)
        .to_string()
}

/// Adjacency map from parent id (`None` for top level) to child folders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderMap {
    children: HashMap<Option<String>, Vec<FolderNode>>,
    count: usize,
}

impl FolderMap {
    /// Group normalized folders by parent. Sibling lists are sorted by name.
    pub fn from_folders(folders: impl IntoIterator<Item = RawFolder>) -> Self {
        let mut children: HashMap<Option<String>, Vec<FolderNode>> = HashMap::new();
        children.insert(None, Vec::new());
        let mut count = 0;

        for raw in folders {
            let node = FolderNode {
                id: extract_id(raw.uri.as_deref()),
                parent_id: raw.parent_id(),
                uri: raw.uri.filter(|uri| !uri.is_empty()),
                name: raw.name,
            };
            children.entry(node.parent_id.clone()).or_default().push(node);
            count += 1;
        }

        for siblings in children.values_mut() {
            siblings.sort_by_key(FolderNode::sort_key);
        }

        debug!(folders = count, parents = children.len(), "Folder map built");
        Self { children, count }
    }

    /// Top-level folders, sorted case-insensitively by name.
    pub fn roots(&self) -> &[FolderNode] {
        self.children
            .get(&None)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Direct children of a folder, sorted case-insensitively by name.
    pub fn children_of(&self, id: &str) -> &[FolderNode] {
        self.children
            .get(&Some(id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Raw adjacency lookup, `None` key included.
    pub fn get(&self, parent: &Option<String>) -> Option<&Vec<FolderNode>> {
        self.children.get(parent)
    }

    /// Parent keys present in the map.
    pub fn parents(&self) -> impl Iterator<Item = &Option<String>> {
        self.children.keys()
    }

    /// Total number of folders.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the account has no folders.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Fetch every folder in one listing pass and build the adjacency map.
pub async fn build_folder_map(source: &dyn CatalogSource) -> ApiResult<FolderMap> {
    let folders = source.folders().await?;
    Ok(FolderMap::from_folders(folders))
}
