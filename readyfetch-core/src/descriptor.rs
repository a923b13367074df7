//! Resource descriptors: the identity of "what should be present" at a destination.

use std::fmt::Debug;

use serde_json::{json, Map, Value};

/// Identity of a remote resource selection.
///
/// The canonical string is persisted verbatim in the readiness marker and is
/// the only thing compared when deciding whether a destination is ready, so it
/// must be deterministic across process runs for the same logical resource.
pub trait ResourceDescriptor: Debug + Send + Sync {
    fn canonical_string(&self) -> String;
}

/// A folder (key prefix) inside a bucket of some object-store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDescriptor {
    backend: String,
    bucket: String,
    folder: String,
}

impl FolderDescriptor {
    pub fn new(
        backend: impl Into<String>,
        bucket: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.into(),
            bucket: bucket.into(),
            folder: folder.into(),
        }
    }

    pub fn s3(bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::new("s3", bucket, folder)
    }

    /// A folder under a local directory tree; `root` plays the role of the bucket.
    pub fn local(root: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::new("file", root, folder)
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }
}

impl ResourceDescriptor for FolderDescriptor {
    fn canonical_string(&self) -> String {
        // serde_json maps keep keys sorted, which keeps the rendering stable.
        let mut root = Map::new();
        root.insert(
            self.backend.clone(),
            json!({
                "bucket": self.bucket,
                "folder": self.folder,
            }),
        );
        Value::Object(root).to_string()
    }
}

impl std::fmt::Display for FolderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_string())
    }
}
