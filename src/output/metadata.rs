//! JSON metadata sidecars
//!
//! The payload is written to a temp file in the destination directory and
//! renamed into place, so a sidecar is never observed half-written.

use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use super::{OutputError, OutputResult};

/// Write `payload` to `path` as pretty-printed UTF-8 JSON, atomically.
pub fn write_sidecar(path: &Path, payload: &Value) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(payload)
        .map_err(|e| OutputError::Serialization(e.to_string()))?;

    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::Io(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(json.as_bytes())
        .map_err(|e| OutputError::Io(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::Io(format!("Failed to flush temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| OutputError::Io(format!("Failed to persist {}: {e}", path.display())))?;

    debug!(path = %path.display(), bytes = json.len(), "Sidecar written");
    Ok(())
}
