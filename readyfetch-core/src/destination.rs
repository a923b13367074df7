//! Destination directory lifecycle: creation and top-level clearing.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::error::OrchestrationError;

fn failure(operation: &'static str, path: &Path, source: io::Error) -> OrchestrationError {
    OrchestrationError::DestinationPreparation {
        operation,
        path: path.to_path_buf(),
        source,
    }
}

/// Creates `dir` and any missing parents. An existing directory is success;
/// an existing non-directory is not.
pub fn ensure_dir(dir: &Path) -> Result<(), OrchestrationError> {
    match fs::create_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
        Err(e) => return Err(failure("create_dir", dir, e)),
    }
    if !dir.is_dir() {
        return Err(failure(
            "create_dir",
            dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
        ));
    }
    debug!(path = %dir.display(), "Destination directory present");
    Ok(())
}

/// Deletes every immediate child of `dir`. Subdirectories are removed with
/// their whole contents, but only the top level is enumerated.
///
/// Returns the number of entries removed.
pub fn clear_dir(dir: &Path) -> Result<usize, OrchestrationError> {
    let mut removed = 0;
    let entries = fs::read_dir(dir).map_err(|e| failure("read_dir", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| failure("read_dir", dir, e))?;
        let path = entry.path();
        // file_type() does not follow symlinks: a link to a directory is unlinked, not traversed.
        let file_type = entry
            .file_type()
            .map_err(|e| failure("file_type", &path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| failure("remove_dir_all", &path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| failure("remove_file", &path, e))?;
        }
        debug!(path = %path.display(), "Removed destination entry");
        removed += 1;
    }
    info!(path = %dir.display(), removed, "Cleared destination directory");
    Ok(removed)
}

/// Runs [`clear_dir`] on tokio's blocking pool so recursive removal never
/// stalls the async workers.
pub async fn clear_dir_blocking(dir: &Path) -> Result<usize, OrchestrationError> {
    let owned = dir.to_path_buf();
    tokio::task::spawn_blocking(move || clear_dir(&owned))
        .await
        .map_err(|e| failure("clear_dir", dir, io::Error::other(e.to_string())))?
}
