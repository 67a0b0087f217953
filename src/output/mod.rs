//! Local output: file naming and metadata sidecars

pub mod metadata;
pub mod path;

pub use metadata::write_sidecar;
pub use path::{asset_file_path, disambiguated_file_path, folder_dir, sanitize_name, sidecar_path};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(String),

    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Create a directory and its parents.
pub fn ensure_dir(dir: &std::path::Path) -> OutputResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OutputError::Io(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Whether `path` exists. Errors other than "not found" are reported, not
/// treated as absence.
pub fn file_exists(path: &std::path::Path) -> OutputResult<bool> {
    path.try_exists()
        .map_err(|e| OutputError::Io(format!("Failed to check {}: {}", path.display(), e)))
}
