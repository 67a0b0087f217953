//! Traversal and per-video processing
//!
//! The orchestrator walks the folder tree depth-first, downloads every video it
//! finds into a directory mirroring the tree, then sweeps the account-wide
//! video listing for anything not filed in a folder. A run-wide [`SeenSet`]
//! guarantees one local copy per video however many times it is listed, and
//! every destination path is claimed by at most one video per run.
//!
//! Failures are split in two:
//! - per-video failures (no rendition, transfer exhausted) are logged, counted
//!   in the [`RunSummary`] and the run continues
//! - listing failures (including 401) and output-directory failures abort

use futures_util::TryStreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::api::{ApiError, CatalogSource};
use crate::downloader::{partial_path, FileTransfer};
use crate::hierarchy::{build_folder_map, FolderMap};
use crate::metrics;
use crate::output::{
    self, asset_file_path, disambiguated_file_path, folder_dir, sidecar_path, write_sidecar,
    OutputError,
};
use crate::selector::{select_rendition, SelectedRendition};
use crate::{AssetRecord, FolderNode};

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A listing could not be read
    #[error("listing failed: {0}")]
    Api(#[from] ApiError),

    /// The output tree could not be created
    #[error("output failed: {0}")]
    Output(#[from] OutputError),
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Root of the local mirror
    pub output_dir: PathBuf,
    /// Replace files that already exist instead of skipping them
    pub overwrite: bool,
    /// Skip the final sweep of videos not filed in any folder
    pub folders_only: bool,
}

impl OrchestratorOptions {
    /// Defaults: no overwrite, sweep enabled.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            overwrite: false,
            folders_only: false,
        }
    }

    /// Set the overwrite policy.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Enable or disable the final sweep.
    pub fn with_folders_only(mut self, folders_only: bool) -> Self {
        self.folders_only = folders_only;
        self
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Folders whose videos were listed
    pub folders_visited: usize,
    /// Files transferred
    pub downloaded: usize,
    /// Videos whose file already existed
    pub skipped_existing: usize,
    /// Repeat encounters of an already processed video
    pub skipped_duplicate: usize,
    /// Videos with no downloadable link
    pub skipped_no_rendition: usize,
    /// Videos whose transfer failed
    pub failed: usize,
    /// Bytes received across all transfers
    pub bytes_transferred: u64,
}

/// Video URIs already handled in this run
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    uris: HashSet<String>,
}

impl SeenSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `uri`; `true` only the first time it is inserted.
    pub fn insert(&mut self, uri: &str) -> bool {
        self.uris.insert(uri.to_string())
    }

    /// Whether `uri` was already recorded.
    pub fn contains(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }

    /// Number of distinct videos recorded.
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetOutcome {
    Downloaded(u64),
    SkippedExisting,
    SkippedDuplicate,
    SkippedNoRendition,
    Failed,
}

impl AssetOutcome {
    fn label(self) -> &'static str {
        match self {
            AssetOutcome::Downloaded(_) => "downloaded",
            AssetOutcome::SkippedExisting => "skipped_existing",
            AssetOutcome::SkippedDuplicate => "skipped_duplicate",
            AssetOutcome::SkippedNoRendition => "skipped_no_rendition",
            AssetOutcome::Failed => "failed",
        }
    }
}

/// Drives one archive run
pub struct Orchestrator<'a> {
    source: &'a dyn CatalogSource,
    transfer: &'a dyn FileTransfer,
    options: OrchestratorOptions,
    seen: SeenSet,
    visited: HashSet<String>,
    claimed: HashSet<PathBuf>,
    summary: RunSummary,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator over a catalog and a transfer engine.
    pub fn new(
        source: &'a dyn CatalogSource,
        transfer: &'a dyn FileTransfer,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            source,
            transfer,
            options,
            seen: SeenSet::new(),
            visited: HashSet::new(),
            claimed: HashSet::new(),
            summary: RunSummary::default(),
        }
    }

    /// Fetch the folder tree, then archive everything.
    pub async fn run(self) -> Result<RunSummary, OrchestratorError> {
        info!("Fetching folder hierarchy");
        let map = build_folder_map(self.source).await?;
        info!(folders = map.len(), "Folder hierarchy loaded");
        self.run_with_map(&map).await
    }

    /// Archive everything using an already built folder map.
    pub async fn run_with_map(mut self, map: &FolderMap) -> Result<RunSummary, OrchestratorError> {
        output::ensure_dir(&self.options.output_dir)?;

        self.walk(map).await?;

        if map.len() > self.visited.len() {
            warn!(
                unreachable = map.len() - self.visited.len(),
                "Some folders are not reachable from the top level"
            );
        }

        if self.options.folders_only {
            info!("Folder-only mode, skipping videos outside folders");
        } else {
            self.sweep().await?;
        }

        let summary = self.summary;
        info!(
            folders = summary.folders_visited,
            downloaded = summary.downloaded,
            skipped_existing = summary.skipped_existing,
            skipped_duplicate = summary.skipped_duplicate,
            skipped_no_rendition = summary.skipped_no_rendition,
            failed = summary.failed,
            bytes = summary.bytes_transferred,
            "Run complete"
        );
        Ok(summary)
    }

    async fn walk(&mut self, map: &FolderMap) -> Result<(), OrchestratorError> {
        let root = self.options.output_dir.clone();
        let mut stack: Vec<(&FolderNode, PathBuf)> = map
            .roots()
            .iter()
            .rev()
            .map(|folder| (folder, root.clone()))
            .collect();

        while let Some((folder, parent_dir)) = stack.pop() {
            let Some(uri) = folder.uri.as_deref() else {
                debug!(id = %folder.id, "Folder without uri, skipping");
                continue;
            };
            if !self.visited.insert(uri.to_string()) {
                debug!(uri = %uri, "Folder already visited");
                continue;
            }

            let dir = folder_dir(&parent_dir, folder);
            let span = info_span!("folder", id = %folder.id, name = %folder.display_name());
            self.process_folder(uri, &dir).instrument(span).await?;

            for child in map.children_of(&folder.id).iter().rev() {
                stack.push((child, dir.clone()));
            }
        }
        Ok(())
    }

    async fn process_folder(&mut self, uri: &str, dir: &Path) -> Result<(), OrchestratorError> {
        info!("== Folder: {} ==", display_relative(dir, &self.options.output_dir));
        self.summary.folders_visited += 1;

        let source = self.source;
        let mut assets = source.folder_assets(uri);
        while let Some(payload) = assets.try_next().await? {
            self.process_asset(payload, dir).await?;
        }
        Ok(())
    }

    async fn sweep(&mut self) -> Result<(), OrchestratorError> {
        info!("== Videos not in any folder ==");
        let root = self.options.output_dir.clone();
        let source = self.source;
        let mut assets = source.all_assets();
        while let Some(payload) = assets.try_next().await? {
            self.process_asset(payload, &root).await?;
        }
        Ok(())
    }

    async fn process_asset(&mut self, payload: Value, dir: &Path) -> Result<(), OrchestratorError> {
        let listing = AssetRecord::from_payload(payload);
        let Some(uri) = listing.uri.clone() else {
            debug!("Video without uri, skipping");
            return Ok(());
        };

        if !self.seen.insert(&uri) {
            debug!(uri = %uri, "Already processed in this run");
            self.record(AssetOutcome::SkippedDuplicate);
            return Ok(());
        }

        let span = info_span!("asset", uri = %uri);
        let outcome = self.handle_asset(listing, &uri, dir).instrument(span).await?;
        self.record(outcome);
        Ok(())
    }

    async fn handle_asset(
        &mut self,
        listing: AssetRecord,
        uri: &str,
        dir: &Path,
    ) -> Result<AssetOutcome, OrchestratorError> {
        let name = listing.display_name();

        let Some((rendition, payload)) = self.choose(&listing, uri).await? else {
            warn!("[skip] No downloadable file link for: {}", name);
            return Ok(AssetOutcome::SkippedNoRendition);
        };

        output::ensure_dir(dir)?;
        let dest = self.claim_destination(dir, &listing, &rendition.extension);
        let exists = match output::file_exists(&dest) {
            Ok(exists) => exists,
            Err(e) => {
                error!(path = %dest.display(), error = %e, "Could not check destination");
                return Ok(AssetOutcome::Failed);
            }
        };

        let outcome = if exists && !self.options.overwrite {
            info!("[skip] Exists: {}", dest.display());
            AssetOutcome::SkippedExisting
        } else {
            if self.options.overwrite {
                if let Err(e) = discard_previous(&dest, exists).await {
                    error!(path = %dest.display(), error = %e, "Could not remove existing file");
                    return Ok(AssetOutcome::Failed);
                }
            }

            info!("Downloading: {} -> {}", name, dest.display());
            match self.transfer.fetch(&rendition.link, &dest).await {
                Ok(transfer) => AssetOutcome::Downloaded(transfer.bytes_written),
                Err(e) => {
                    error!(path = %dest.display(), error = %e, "Download failed");
                    return Ok(AssetOutcome::Failed);
                }
            }
        };

        let meta_path = sidecar_path(&dest);
        if let Err(e) = write_sidecar(&meta_path, &payload) {
            warn!(path = %meta_path.display(), error = %e, "Could not write metadata");
        }
        Ok(outcome)
    }

    /// Destination for `listing` in `dir`, never one already used by another
    /// video in this run.
    fn claim_destination(&mut self, dir: &Path, listing: &AssetRecord, extension: &str) -> PathBuf {
        let dest = asset_file_path(dir, listing, extension);
        if self.claimed.insert(dest.clone()) {
            return dest;
        }

        let renamed = disambiguated_file_path(dir, listing, extension);
        debug!(
            taken = %dest.display(),
            path = %renamed.display(),
            "File name already used in this run, adding video id"
        );
        self.claimed.insert(renamed.clone());
        renamed
    }

    /// Pick a rendition from the listing payload, falling back to one detail
    /// fetch. Returns the payload the rendition came from.
    async fn choose(
        &self,
        listing: &AssetRecord,
        uri: &str,
    ) -> Result<Option<(SelectedRendition, Value)>, OrchestratorError> {
        if let Some(rendition) = select_rendition(listing) {
            return Ok(Some((rendition, listing.payload.clone())));
        }

        debug!("No rendition in listing payload, fetching details");
        match self.source.asset_detail(uri).await {
            Ok(detail) => {
                let detail = AssetRecord::from_payload(detail);
                Ok(select_rendition(&detail).map(|rendition| (rendition, detail.payload)))
            }
            Err(e @ ApiError::Unauthorized { .. }) => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Detail fetch failed");
                Ok(None)
            }
        }
    }

    fn record(&mut self, outcome: AssetOutcome) {
        metrics::record_asset_outcome(outcome.label());
        match outcome {
            AssetOutcome::Downloaded(bytes) => {
                self.summary.downloaded += 1;
                self.summary.bytes_transferred += bytes;
            }
            AssetOutcome::SkippedExisting => self.summary.skipped_existing += 1,
            AssetOutcome::SkippedDuplicate => self.summary.skipped_duplicate += 1,
            AssetOutcome::SkippedNoRendition => self.summary.skipped_no_rendition += 1,
            AssetOutcome::Failed => self.summary.failed += 1,
        }
    }
}

/// Remove the finished file (when `exists`) and any leftover `.part` so an
/// overwrite starts from zero.
async fn discard_previous(dest: &Path, exists: bool) -> std::io::Result<()> {
    if exists {
        tokio::fs::remove_file(dest).await?;
    }
    match tokio::fs::remove_file(partial_path(dest)).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn display_relative(dir: &Path, root: &Path) -> String {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .display()
        .to_string()
}
