//! Local directory tree exposed as an object store.
//!
//! The root directory plays the bucket; keys are `/`-separated paths relative
//! to it. Listings are sorted by name and paginated with numeric offsets.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::{ObjectListing, ObjectStore, DELIMITER};
use crate::error::DownloadError;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Entries per listing page; values below 1 are treated as 1.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectListing, DownloadError> {
        if delimiter != DELIMITER {
            return Err(DownloadError::remote(
                "list",
                prefix,
                format!("unsupported delimiter {delimiter:?}"),
            ));
        }
        let offset = match continuation {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|e| {
                DownloadError::remote("list", format!("{prefix} (continuation {token:?})"), e)
            })?,
        };

        // "a/b/pre" lists directory "a/b/" filtered to names starting with "pre".
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => prefix.split_at(idx + 1),
            None => ("", prefix),
        };
        let dir = self.root.join(dir_part);

        let mut entries: Vec<(String, bool)> = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ObjectListing::default()),
            Err(e) => return Err(DownloadError::io("read_dir", &dir, e)),
        };
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| DownloadError::io("read_dir", &dir, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 name");
                continue;
            };
            if !name.starts_with(name_prefix) {
                continue;
            }
            let is_dir = tokio::fs::metadata(entry.path())
                .await
                .map_err(|e| DownloadError::io("metadata", entry.path(), e))?
                .is_dir();
            entries.push((name, is_dir));
        }
        entries.sort();

        let mut listing = ObjectListing::default();
        let end = (offset + self.page_size).min(entries.len());
        for (name, is_dir) in entries.iter().take(end).skip(offset) {
            if *is_dir {
                listing.common_prefixes.push(format!("{dir_part}{name}/"));
            } else {
                listing.keys.push(format!("{dir_part}{name}"));
            }
        }
        if end < entries.len() {
            listing.next_continuation = Some(end.to_string());
        }
        Ok(listing)
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), DownloadError> {
        let source = self.root.join(key);
        tokio::fs::copy(&source, local_path)
            .await
            .map_err(|e| DownloadError::io("copy", &source, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_one_level_with_prefixes_and_pages() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("root/sub")).unwrap();
        std::fs::write(tmp.path().join("root/a.txt"), b"a").unwrap();
        std::fs::write(tmp.path().join("root/b.txt"), b"b").unwrap();
        std::fs::write(tmp.path().join("root/sub/c.txt"), b"c").unwrap();

        let store = FilesystemObjectStore::new(tmp.path()).with_page_size(2);
        let first = store.list("root/", "/", None).await.unwrap();
        assert_eq!(first.keys, vec!["root/a.txt", "root/b.txt"]);
        assert!(first.common_prefixes.is_empty());
        assert_eq!(first.next_continuation.as_deref(), Some("2"));

        let second = store.list("root/", "/", Some("2")).await.unwrap();
        assert!(second.keys.is_empty());
        assert_eq!(second.common_prefixes, vec!["root/sub/"]);
        assert_eq!(second.next_continuation, None);
    }

    #[tokio::test]
    async fn missing_prefix_lists_nothing() {
        let tmp = tempdir().unwrap();
        let store = FilesystemObjectStore::new(tmp.path());
        let listing = store.list("nope/", "/", None).await.unwrap();
        assert_eq!(listing, ObjectListing::default());
    }
}
