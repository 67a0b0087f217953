//! The `tree` command: print the folder tree with its videos
//!
//! Fetching and rendering are separate. Listings are gathered first into a
//! [`TreeNode`] model, which [`render_tree`] turns into text:
//!
//! ```text
//! Vimeo account (Studio)
//! |-- Clients [folder 10]
//! |   |-- Acme [folder 11]
//! |   |   `-- Teaser [video 501]
//! |   `-- Kickoff [video 502]
//! `-- (no folder)
//!     `-- Scratch [video 503]
//! ```

use clap::Args;
use futures_util::TryStreamExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::api::config::TREE_PAGE_SIZE;
use crate::api::VimeoApi;
use crate::hierarchy::{build_folder_map, extract_id, FolderMap};
use crate::output::path::clean_display_name;
use crate::FolderNode;

use super::{Cli, CliError};

/// Header used when the account name is unavailable
pub const ACCOUNT_LABEL: &str = "Vimeo account";

/// Label of the group holding videos outside any folder
pub const UNFILED_LABEL: &str = "(no folder)";

/// Arguments for the `tree` command
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Print folders only, without videos
    #[arg(long, default_value_t = false)]
    pub folders_only: bool,
}

/// One printed line and everything nested under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Text printed for this node
    pub label: String,
    /// Nested nodes, printed in order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// `<name> [folder <id>]`
    pub fn folder(id: &str, name: Option<&str>) -> Self {
        let name = clean_display_name(name).unwrap_or_else(|| format!("folder {id}"));
        Self::leaf(format!("{name} [folder {id}]"))
    }

    /// `<name> [video <id>]`, built from a listing item.
    pub fn video(item: &Value) -> Self {
        let id = extract_id(item.get("uri").and_then(Value::as_str));
        let name = clean_display_name(item.get("name").and_then(Value::as_str))
            .unwrap_or_else(|| format!("video {id}"));
        Self::leaf(format!("{name} [video {id}]"))
    }

    /// A node with no children.
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }
}

/// Header line for an account.
pub fn account_header(name: Option<&str>) -> String {
    match clean_display_name(name) {
        Some(name) => format!("{ACCOUNT_LABEL} ({name})"),
        None => ACCOUNT_LABEL.to_string(),
    }
}

/// Render the header followed by the nodes with `|-- ` / `` `-- `` connectors.
pub fn render_tree(header: &str, nodes: &[TreeNode]) -> String {
    let mut lines = vec![header.to_string()];
    render_level(nodes, "", &mut lines);
    lines.join("\n")
}

fn render_level(nodes: &[TreeNode], prefix: &str, lines: &mut Vec<String>) {
    for (index, node) in nodes.iter().enumerate() {
        let last = index + 1 == nodes.len();
        let connector = if last { "`-- " } else { "|-- " };
        lines.push(format!("{prefix}{connector}{}", node.label));

        let child_prefix = format!("{prefix}{}", if last { "    " } else { "|   " });
        render_level(&node.children, &child_prefix, lines);
    }
}

/// Build the folder nodes. `videos` maps folder URI to the videos listed in it.
///
/// A folder reached a second time (duplicate or cyclic listing) is printed but
/// not expanded again.
pub fn build_folder_nodes(map: &FolderMap, videos: &HashMap<String, Vec<Value>>) -> Vec<TreeNode> {
    let mut expanded = HashSet::new();
    map.roots()
        .iter()
        .map(|folder| folder_node(folder, map, videos, &mut expanded))
        .collect()
}

fn folder_node(
    folder: &FolderNode,
    map: &FolderMap,
    videos: &HashMap<String, Vec<Value>>,
    expanded: &mut HashSet<String>,
) -> TreeNode {
    let mut node = TreeNode::folder(&folder.id, folder.name.as_deref());
    let Some(uri) = folder.uri.as_deref() else {
        return node;
    };
    if !expanded.insert(uri.to_string()) {
        return node;
    }

    for child in map.children_of(&folder.id) {
        node.children.push(folder_node(child, map, videos, expanded));
    }
    if let Some(items) = videos.get(uri) {
        node.children.extend(items.iter().map(TreeNode::video));
    }
    node
}

impl TreeArgs {
    /// Fetch the account structure and print it to stdout.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.api_config(TREE_PAGE_SIZE)?;
        let api = VimeoApi::new(config)?;

        let map = build_folder_map(&api).await?;
        let header = account_header(api.account_name().await.as_deref());

        let mut videos: HashMap<String, Vec<Value>> = HashMap::new();
        if !self.folders_only {
            for uri in reachable_folder_uris(&map) {
                let items: Vec<Value> = api.folder_asset_names(&uri).try_collect().await?;
                debug!(folder = %uri, videos = items.len(), "Folder listed");
                videos.insert(uri, items);
            }
        }

        let mut nodes = build_folder_nodes(&map, &videos);

        if !self.folders_only {
            let unfiled = api.unfiled_assets().await?;
            if !unfiled.is_empty() {
                let mut group = TreeNode::leaf(UNFILED_LABEL);
                group.children = unfiled.iter().map(TreeNode::video).collect();
                nodes.push(group);
            }
        }

        println!("{}", render_tree(&header, &nodes));
        Ok(())
    }
}

/// Folder URIs reachable from the top level, in print order, each once.
fn reachable_folder_uris(map: &FolderMap) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<&FolderNode> = map.roots().iter().rev().collect();

    while let Some(folder) = stack.pop() {
        let Some(uri) = folder.uri.as_deref() else {
            continue;
        };
        if !visited.insert(uri.to_string()) {
            continue;
        }
        order.push(uri.to_string());
        stack.extend(map.children_of(&folder.id).iter().rev());
    }
    order
}
