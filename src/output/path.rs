//! File and directory naming
//!
//! Folder and video names come straight from user input on the hosting
//! service, so every path component is sanitized before it touches the
//! filesystem. The layout mirrors the folder tree:
//!
//! ```text
//! <out>/<folder>/<subfolder>/<video name><ext>
//! <out>/<folder>/<subfolder>/<video name><ext>.json
//! <out>/<unfiled video name><ext>
//! ```
//!
//! Two different videos whose names sanitize to the same file in one
//! directory are told apart by an `_<id>` suffix on the later one.

use std::path::{Path, PathBuf};

use crate::{AssetRecord, FolderNode};

/// Sanitize a name for use as a single path component.
///
/// Alphanumerics, space, `-`, `_` and `.` are kept; anything else becomes `_`.
/// Surrounding whitespace is trimmed. An empty result, or one made only of
/// dots, is replaced by `fallback`.
pub fn sanitize_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Collapse runs of whitespace; `None` when nothing printable remains.
pub fn clean_display_name(name: Option<&str>) -> Option<String> {
    let collapsed = name?.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Directory of a folder under its parent's directory.
pub fn folder_dir(parent: &Path, folder: &FolderNode) -> PathBuf {
    let fallback = format!("folder_{}", folder.id);
    parent.join(sanitize_name(
        folder.name.as_deref().unwrap_or_default(),
        &fallback,
    ))
}

/// Destination of a video file inside `dir`.
pub fn asset_file_path(dir: &Path, asset: &AssetRecord, extension: &str) -> PathBuf {
    let fallback = format!("video_{}", asset.id());
    let base = sanitize_name(&asset.display_name(), &fallback);
    dir.join(format!("{base}{extension}"))
}

/// Destination used when [`asset_file_path`] is already taken by another
/// video in the same run: `<name>_<id><ext>`.
pub fn disambiguated_file_path(dir: &Path, asset: &AssetRecord, extension: &str) -> PathBuf {
    let id = asset.id();
    let fallback = format!("video_{id}");
    let base = sanitize_name(&asset.display_name(), &fallback);
    dir.join(format!("{base}_{id}{extension}"))
}

/// Sidecar path: the full file name plus `.json` (`clip.mp4` -> `clip.mp4.json`).
pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}
