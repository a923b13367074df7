//! Hierarchical object-store downloads.
//!
//! [`PrefixDownloader`] walks a key namespace below a source root using
//! delimiter listings, follows pagination, and reproduces the hierarchy under
//! the destination directory. Backends only implement the two primitives of
//! [`ObjectStore`]: list one page, fetch one object.

pub mod filesystem;
pub mod s3;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::contract::{DownloadStream, ResourceDownloader};
use crate::error::DownloadError;

pub use filesystem::FilesystemObjectStore;
pub use s3::{S3FolderDownloader, S3ObjectStore, S3Settings};

/// Separator between "directory" levels of an object key.
pub const DELIMITER: &str = "/";

/// One page of a delimiter listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Child "directories" directly below the listed prefix, each ending in the delimiter.
    pub common_prefixes: Vec<String>,
    /// Object keys directly below the listed prefix.
    pub keys: Vec<String>,
    /// Set when more pages follow for the same prefix.
    pub next_continuation: Option<String>,
}

/// Minimal object-store surface needed to mirror a prefix.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location for logs, e.g. `s3://bucket`.
    fn describe(&self) -> String;

    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectListing, DownloadError>;

    /// Transfers `key` to `local_path`. Returns only once the file is fully written.
    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), DownloadError>;
}

/// Normalises a source folder into a key prefix: no leading delimiter, one
/// trailing delimiter. An empty folder selects the whole bucket.
pub fn normalize_source_root(folder: &str) -> String {
    let trimmed = folder.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Maps an object key to its local path, dropping the source-root segments.
///
/// `a/b/c/d.txt` under root `a/b/` lands at `<destination>/c/d.txt`.
pub fn local_path_for_key(
    destination: &Path,
    source_root: &str,
    key: &str,
) -> Result<PathBuf, DownloadError> {
    let relative = key
        .strip_prefix(source_root)
        .ok_or_else(|| DownloadError::InvalidKey {
            key: key.to_string(),
            reason: "outside the source root",
        })?;
    if relative.is_empty() {
        return Err(DownloadError::InvalidKey {
            key: key.to_string(),
            reason: "names the source root itself",
        });
    }
    let mut path = destination.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(DownloadError::InvalidKey {
                key: key.to_string(),
                reason: "contains an unsafe path segment",
            });
        }
        path.push(segment);
    }
    Ok(path)
}

/// Mirrors everything below a source root of an [`ObjectStore`].
pub struct PrefixDownloader<S> {
    store: Arc<S>,
    source_root: String,
    recursive: bool,
}

impl<S: ObjectStore + 'static> PrefixDownloader<S> {
    pub fn new(store: S, source_folder: &str) -> Self {
        Self {
            store: Arc::new(store),
            source_root: normalize_source_root(source_folder),
            recursive: true,
        }
    }

    /// When false, only objects directly below the source root are downloaded.
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ObjectStore + 'static> ResourceDownloader for PrefixDownloader<S> {
    fn produce(&self, destination: &Path) -> DownloadStream {
        info!(
            store = %self.store.describe(),
            source_root = %self.source_root,
            destination = %destination.display(),
            recursive = self.recursive,
            "Starting prefix download"
        );
        let walk = Walk {
            store: Arc::clone(&self.store),
            source_root: self.source_root.clone(),
            destination: destination.to_path_buf(),
            recursive: self.recursive,
            cursors: vec![Cursor {
                prefix: self.source_root.clone(),
                continuation: None,
            }],
            queued: VecDeque::new(),
        };
        stream::try_unfold(walk, Walk::step).boxed()
    }
}

/// A listing position: a prefix and, for follow-up pages, its continuation token.
struct Cursor {
    prefix: String,
    continuation: Option<String>,
}

/// Explicit traversal state of one `produce` call. Depth-first over prefixes;
/// objects of a page are downloaded before the next page or child prefix is listed.
struct Walk<S> {
    store: Arc<S>,
    source_root: String,
    destination: PathBuf,
    recursive: bool,
    cursors: Vec<Cursor>,
    queued: VecDeque<String>,
}

impl<S: ObjectStore> Walk<S> {
    async fn step(mut self) -> Result<Option<(PathBuf, Self)>, DownloadError> {
        loop {
            if let Some(key) = self.queued.pop_front() {
                let path = self.fetch(&key).await?;
                return Ok(Some((path, self)));
            }
            let Some(cursor) = self.cursors.pop() else {
                debug!(source_root = %self.source_root, "Prefix download exhausted");
                return Ok(None);
            };
            self.list(cursor).await?;
        }
    }

    async fn list(&mut self, cursor: Cursor) -> Result<(), DownloadError> {
        debug!(prefix = %cursor.prefix, "Listing objects");
        let listing = self
            .store
            .list(&cursor.prefix, DELIMITER, cursor.continuation.as_deref())
            .await?;

        if let Some(token) = listing.next_continuation {
            self.cursors.push(Cursor {
                prefix: cursor.prefix,
                continuation: Some(token),
            });
        }
        if self.recursive {
            // Reversed so the stack pops children in listing order.
            for prefix in listing.common_prefixes.into_iter().rev() {
                self.cursors.push(Cursor {
                    prefix,
                    continuation: None,
                });
            }
        }
        // Keys ending in the delimiter are folder placeholders, not files.
        self.queued
            .extend(listing.keys.into_iter().filter(|key| !key.ends_with(DELIMITER)));
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<PathBuf, DownloadError> {
        let local_path = local_path_for_key(&self.destination, &self.source_root, key)?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io("create_dir", parent, e))?;
        }
        info!(key, path = %local_path.display(), "Starting download of object");
        self.store.fetch(key, &local_path).await?;
        info!(key, path = %local_path.display(), "Finished download of object");
        Ok(local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_source_root_adds_trailing_and_strips_leading_delimiter() {
        assert_eq!(normalize_source_root("a/b"), "a/b/");
        assert_eq!(normalize_source_root("/a/b/"), "a/b/");
        assert_eq!(normalize_source_root(""), "");
        assert_eq!(normalize_source_root("/"), "");
    }

    #[test]
    fn key_below_root_drops_root_segments() {
        let path = local_path_for_key(Path::new("/dest"), "a/b/", "a/b/c/d.txt").unwrap();
        assert_eq!(path, PathBuf::from("/dest/c/d.txt"));
    }

    #[test]
    fn key_outside_root_or_with_traversal_is_rejected() {
        assert!(matches!(
            local_path_for_key(Path::new("/dest"), "a/b/", "x/y.txt"),
            Err(DownloadError::InvalidKey { .. })
        ));
        assert!(matches!(
            local_path_for_key(Path::new("/dest"), "a/", "a/../../etc/passwd"),
            Err(DownloadError::InvalidKey { .. })
        ));
    }
}
