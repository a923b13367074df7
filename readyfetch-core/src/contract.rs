//! # contract: capability interfaces the orchestrator depends on
//!
//! The orchestrator knows nothing about where files come from or what happens
//! to them afterwards. It drives two traits:
//!
//! - [`ResourceDownloader`] produces a single-pass stream of local paths, each
//!   yielded only once the file is fully written.
//! - [`PostProcessor`] applies a side-effecting transform to one downloaded path.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; the mocks are exported behind the
//! default `test-export-mocks` feature so integration tests and downstream
//! crates can script downloads and observe processing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{DownloadError, ProcessError};

/// Stream of completed downloads. Ends either normally or at the first `Err`.
pub type DownloadStream = BoxStream<'static, Result<PathBuf, DownloadError>>;

/// Materialises a remote resource under a destination directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ResourceDownloader: Send + Sync {
    /// Start producing files under `destination`.
    ///
    /// The stream is lazy: nothing is transferred until it is polled. An empty
    /// stream is a valid result; whether that is an error is the caller's call.
    fn produce(&self, destination: &Path) -> DownloadStream;
}

/// Side-effecting transform applied to one downloaded file.
///
/// Implementations run concurrently on different paths and must bring their
/// own synchronisation for any shared state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PostProcessor: Send + Sync {
    async fn process(&self, path: &Path) -> Result<(), ProcessError>;
}
