// crates/airlift-loader/src/files.rs
// ============================================================================
// Module: Airlift Content Files
// Description: Content-addressed file writes shared by both loaders.
// Purpose: Write each asset's bytes exactly once, atomically.
// Dependencies: tempfile
// ============================================================================

//! ## Overview
//! Asset bytes always land in a temp file inside the updates directory and
//! are renamed into their content-addressed name only after the caller has
//! verified the digest. Rename is atomic on the same filesystem, so a
//! reader never observes a partially written asset, and two writers racing
//! to the same path both leave identical bytes behind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;

// ============================================================================
// SECTION: Writes
// ============================================================================

/// Writes `bytes` to `updates_directory/relative_path` via a temp file and
/// atomic rename. An already-present file is left untouched; the path is
/// content-addressed, so its bytes are the same.
///
/// # Errors
///
/// Returns an I/O error string when the directory cannot be created or the
/// write/rename fails.
pub(crate) fn write_content_file(
    updates_directory: &Path,
    relative_path: &str,
    bytes: &[u8],
) -> Result<(), String> {
    std::fs::create_dir_all(updates_directory).map_err(|err| err.to_string())?;
    let target = updates_directory.join(relative_path);
    if target.is_file() {
        return Ok(());
    }
    let mut temp = NamedTempFile::new_in(updates_directory).map_err(|err| err.to_string())?;
    temp.write_all(bytes).map_err(|err| err.to_string())?;
    temp.as_file().sync_all().map_err(|err| err.to_string())?;
    temp.persist(&target).map_err(|err| err.to_string())?;
    Ok(())
}

/// Removes a stored asset file, tolerating files already gone.
pub(crate) fn remove_content_file(updates_directory: &Path, relative_path: &str) {
    let target = updates_directory.join(relative_path);
    if let Err(err) = std::fs::remove_file(&target)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %target.display(), error = %err, "failed to remove asset file");
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time as unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
