#![doc = "readyfetch-core: core logic library for readyfetch."]

//! Materialises a remote folder into a local directory exactly once.
//!
//! The [`orchestrator`] drives a [`contract::ResourceDownloader`], fans the
//! downloaded files out to [`contract::PostProcessor`]s, and records success
//! with a readiness marker keyed to a [`descriptor::ResourceDescriptor`].
//! Concrete downloaders live in [`remote`], the zip post-processor in [`unzip`].

pub mod contract;
pub mod descriptor;
pub mod destination;
pub mod error;
pub mod flagger;
pub mod orchestrator;
pub mod remote;
pub mod unzip;

pub use contract::{DownloadStream, PostProcessor, ResourceDownloader};
pub use descriptor::{FolderDescriptor, ResourceDescriptor};
pub use error::{DownloadError, OrchestrationError, PostProcessFailure, ProcessError};
pub use flagger::{ReadinessFlagger, DEFAULT_READY_FILE_NAME};
pub use orchestrator::{DownloadOrchestrator, OrchestratorConfig, RunReport};
pub use unzip::FileUnzipper;
