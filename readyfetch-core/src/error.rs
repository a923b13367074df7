//! Error types for the readyfetch pipeline.
//!
//! Each stage owns its error enum: downloaders return [`DownloadError`],
//! post-processors return [`ProcessError`], and the orchestrator folds both
//! into [`OrchestrationError`]. Variants carry the operation and path that
//! failed so a log line is enough to reproduce the failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used for backend failures we do not model individually.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while enumerating or transferring remote objects.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Local filesystem failure while materialising an object.
    #[error("download io failure during {operation} at {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failure reported by the remote backend (listing or transfer).
    #[error("remote {operation} failed for {target}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxError,
    },
    /// An object key that cannot be mapped under the destination directory.
    #[error("object key {key:?} rejected: {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl DownloadError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn remote(
        operation: &'static str,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Remote {
            operation,
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Errors produced by post-processors.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("post-processing io failure during {operation} at {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip failure during {operation} for {path}")]
    Zip {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    /// Archive entry would be written outside the extraction directory.
    #[error("archive {archive} contains unsafe entry {entry:?}")]
    UnsafeEntry { archive: PathBuf, entry: String },
    #[error("post-processing task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl ProcessError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// One downloaded file whose post-processing did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessFailure {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for PostProcessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Errors that abort an orchestration run. None of them leave a readiness marker behind.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("invalid orchestrator config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// Reading, writing or removing the readiness marker failed.
    #[error("readiness marker failure at {path}")]
    Readiness {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare destination ({operation}) at {path}")]
    DestinationPreparation {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The download stream failed. Post-processing of the files that did land
    /// still ran to completion; its failures are carried alongside.
    #[error("download failed{}", post_processing_suffix(.post_processing))]
    Download {
        #[source]
        source: DownloadError,
        post_processing: Vec<PostProcessFailure>,
    },
    #[error(
        "downloaded zero files into {destination}. Check your configuration and that the source contains resources."
    )]
    NothingDownloaded { destination: PathBuf },
    #[error("post-processing failed for {} file(s)", .failures.len())]
    PostProcessing { failures: Vec<PostProcessFailure> },
}

fn post_processing_suffix(failures: &[PostProcessFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (post-processing also failed for {} file(s))", failures.len())
    }
}

impl OrchestrationError {
    /// Whether the failure belongs to the IO category (filesystem or empty result).
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Readiness { .. }
                | Self::DestinationPreparation { .. }
                | Self::NothingDownloaded { .. }
        )
    }
}
