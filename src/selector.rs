//! Rendition selection
//!
//! Picks one downloadable file per video. Candidates are tried in three tiers:
//!
//! 1. progressive MP4 entries of `files`
//! 2. any other `files` entry with a link
//! 3. entries of the `download` array
//!
//! Within the first two tiers the tallest frame wins, then the highest bitrate.
//! In the download tier the tallest frame wins, then the uploaded master
//! (`source`/`original`). Sorting is stable, so full ties keep list order.

use std::cmp::Reverse;

use reqwest::Url;

use crate::AssetRecord;

/// Media type of progressive (directly playable) renditions
pub const PROGRESSIVE_TYPE: &str = "video/mp4";

/// Extensions kept as-is when inferred from a link
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mpg", "mpeg", "avi", "wmv", "mkv"];

/// Extension used when the link gives no usable hint
pub const DEFAULT_EXTENSION: &str = ".mp4";

/// Tier a rendition was selected from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionOrigin {
    /// Progressive MP4 from `files`
    Progressive,
    /// Other direct file from `files`
    Direct,
    /// Entry of the `download` array
    DownloadList,
}

/// The file chosen for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRendition {
    /// Byte-serving link
    pub link: String,
    /// Output extension, including the leading dot
    pub extension: String,
    /// Quality label, if the API gave one
    pub quality: Option<String>,
    /// Tier it came from
    pub origin: RenditionOrigin,
    /// Frame height, if known
    pub height: Option<u64>,
}

fn has_link(link: &Option<String>) -> bool {
    link.as_deref().is_some_and(|link| !link.trim().is_empty())
}

/// Choose the best rendition of a video, or `None` if it has no usable link.
pub fn select_rendition(asset: &AssetRecord) -> Option<SelectedRendition> {
    let mut progressive = Vec::new();
    let mut direct = Vec::new();
    for file in asset.files.iter().filter(|file| has_link(&file.link)) {
        if file.media_type.as_deref() == Some(PROGRESSIVE_TYPE) {
            progressive.push(file);
        } else {
            direct.push(file);
        }
    }

    for (tier, origin) in [
        (progressive, RenditionOrigin::Progressive),
        (direct, RenditionOrigin::Direct),
    ] {
        let mut tier = tier;
        tier.sort_by_key(|file| {
            Reverse((file.height.unwrap_or(0), file.bitrate.unwrap_or(0)))
        });
        if let Some(best) = tier.first() {
            let link = best.link.clone().unwrap_or_default();
            return Some(SelectedRendition {
                extension: infer_extension(&link),
                link,
                quality: best.quality.clone(),
                origin,
                height: best.height,
            });
        }
    }

    let mut downloads: Vec<_> = asset
        .download
        .iter()
        .filter(|entry| has_link(&entry.link))
        .collect();
    downloads.sort_by_key(|entry| Reverse((entry.height.unwrap_or(0), entry.is_source())));

    downloads.first().map(|best| {
        let link = best.link.clone().unwrap_or_default();
        SelectedRendition {
            extension: infer_extension(&link),
            link,
            quality: best.quality.clone(),
            origin: RenditionOrigin::DownloadList,
            height: best.height,
        }
    })
}

/// Extension of the link's final path segment if it is a known video
/// container, otherwise `.mp4`.
pub fn infer_extension(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| {
            let segment = url.path_segments()?.last()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS
                .contains(&ext.as_str())
                .then(|| format!(".{ext}"))
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
