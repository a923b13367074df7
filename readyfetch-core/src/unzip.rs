//! Zip-archive post-processor: unpacks `.zip` downloads in place.

use std::fs::{self, File};
use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::contract::PostProcessor;
use crate::error::ProcessError;

/// Extracts zip archives into the directory that contains them.
///
/// Files without a `.zip` extension are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileUnzipper {
    delete_archive: bool,
}

impl FileUnzipper {
    pub fn new(delete_archive: bool) -> Self {
        Self { delete_archive }
    }

    pub fn deletes_archive(&self) -> bool {
        self.delete_archive
    }

    pub fn matches(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    }
}

#[async_trait]
impl PostProcessor for FileUnzipper {
    async fn process(&self, path: &Path) -> Result<(), ProcessError> {
        if !Self::matches(path) {
            debug!(path = %path.display(), "Not a zip archive, skipping");
            return Ok(());
        }
        let archive = path.to_path_buf();
        let target = archive
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let delete_archive = self.delete_archive;

        tokio::task::spawn_blocking(move || {
            info!(path = %archive.display(), "Unzipping archive");
            let entries = extract_zip(&archive, &target)?;
            info!(path = %archive.display(), entries, "Finished unzipping archive");
            if delete_archive {
                fs::remove_file(&archive)
                    .map_err(|e| ProcessError::io("remove_archive", &archive, e))?;
                info!(path = %archive.display(), "Deleted archive file");
            }
            Ok(())
        })
        .await?
    }
}

fn extract_zip(archive_path: &Path, target: &Path) -> Result<usize, ProcessError> {
    let file = File::open(archive_path).map_err(|e| ProcessError::io("open", archive_path, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ProcessError::zip("decode", archive_path, e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ProcessError::zip("read_entry", archive_path, e))?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ProcessError::UnsafeEntry {
                archive: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            })?;
        let destination = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|e| ProcessError::io("create_dir", &destination, e))?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ProcessError::io("create_parent", parent, e))?;
        }
        let mut output = File::create(&destination)
            .map_err(|e| ProcessError::io("create_file", &destination, e))?;
        io::copy(&mut entry, &mut output).map_err(|e| ProcessError::io("copy", &destination, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&destination, fs::Permissions::from_mode(mode))
                .map_err(|e| ProcessError::io("set_permissions", &destination, e))?;
        }
    }
    Ok(archive.len())
}
