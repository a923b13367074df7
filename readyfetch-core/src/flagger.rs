//! Readiness marker: a sentinel file recording which descriptor is materialised in a directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::descriptor::ResourceDescriptor;
use crate::error::OrchestrationError;

/// Default file name of the readiness marker inside the destination directory.
pub const DEFAULT_READY_FILE_NAME: &str = ".ready";

/// Reads and writes the readiness marker for one descriptor in one destination.
#[derive(Debug, Clone)]
pub struct ReadinessFlagger {
    marker_path: PathBuf,
    canonical: String,
}

impl ReadinessFlagger {
    pub fn new(
        destination_dir: &Path,
        ready_file_name: &str,
        descriptor: &dyn ResourceDescriptor,
    ) -> Self {
        Self {
            marker_path: destination_dir.join(ready_file_name),
            canonical: descriptor.canonical_string(),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// True iff the marker exists and its bytes equal the descriptor's canonical string.
    pub fn is_ready(&self) -> Result<bool, OrchestrationError> {
        match fs::read(&self.marker_path) {
            Ok(contents) => {
                let ready = contents == self.canonical.as_bytes();
                debug!(
                    marker = %self.marker_path.display(),
                    ready,
                    "Read readiness marker"
                );
                Ok(ready)
            }
            Err(e) if self.cannot_exist(&e) => Ok(false),
            Err(e) => Err(self.failure(e)),
        }
    }

    /// Atomically creates or replaces the marker with the canonical string.
    pub fn flag_ready(&self) -> Result<(), OrchestrationError> {
        info!(
            descriptor = %self.canonical,
            marker = %self.marker_path.display(),
            "Flagging resource as ready to consume"
        );
        let dir = self.marker_path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| self.failure(e))?;
        staged
            .write_all(self.canonical.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| self.failure(e))?;
        staged
            .persist(&self.marker_path)
            .map_err(|e| self.failure(e.error))?;
        Ok(())
    }

    /// Removes a marker that does not describe the current descriptor.
    ///
    /// A marker left from another descriptor would otherwise survive a failed
    /// run and vouch for a directory that has since been partially rewritten.
    pub fn invalidate(&self) -> Result<(), OrchestrationError> {
        match fs::remove_file(&self.marker_path) {
            Ok(()) => {
                info!(marker = %self.marker_path.display(), "Removed stale readiness marker");
                Ok(())
            }
            Err(e) if self.cannot_exist(&e) => Ok(()),
            Err(e) => Err(self.failure(e)),
        }
    }

    /// A marker is absent when the path is missing or its parent is not a
    /// directory; the latter is left for destination preparation to report.
    fn cannot_exist(&self, error: &io::Error) -> bool {
        error.kind() == io::ErrorKind::NotFound
            || self
                .marker_path
                .parent()
                .is_some_and(|dir| dir.exists() && !dir.is_dir())
    }

    fn failure(&self, source: io::Error) -> OrchestrationError {
        OrchestrationError::Readiness {
            path: self.marker_path.clone(),
            source,
        }
    }
}
