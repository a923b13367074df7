//! High-level pipeline: make a destination directory hold exactly one descriptor's content.
//!
//! [`DownloadOrchestrator::ensure_resources_ready`] is idempotent. A run:
//!   - returns immediately when the readiness marker already matches the descriptor
//!   - prepares the destination (create, optionally clear its top level)
//!   - drains the downloader's stream, scheduling post-processing for every file as it lands
//!   - waits for every post-processing task, whatever happened to the stream
//!   - applies the zero-download policy and only then writes the readiness marker
//!
//! # Concurrency
//! Post-processing tasks live in a [`JoinSet`] and are spawned as soon as a
//! file is yielded. A [`Semaphore`] caps how many run at once; permits are
//! acquired inside the task so the control loop never stalls on processing.
//!
//! # Error Handling
//! Every failure leaves the destination without a marker, so re-invoking the
//! entry point retries the whole download. Post-processing failures are
//! collected per file and reported after the barrier.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::contract::{PostProcessor, ResourceDownloader};
use crate::descriptor::ResourceDescriptor;
use crate::destination;
use crate::error::{OrchestrationError, PostProcessFailure};
use crate::flagger::{ReadinessFlagger, DEFAULT_READY_FILE_NAME};

/// Default cap on simultaneously running post-processing tasks.
pub const DEFAULT_POST_PROCESSING_CONCURRENCY: usize = 16;

/// Behavioural switches for an orchestrator. Every field has a default, so a
/// partial YAML/JSON document deserialises cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Remove every top-level entry of the destination before downloading.
    pub clear_destination_before_download: bool,
    /// Fail the run (and skip the marker) when the downloader yields nothing.
    pub error_on_nothing_downloaded: bool,
    pub ready_file_name: String,
    pub max_concurrent_post_processing: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            clear_destination_before_download: false,
            error_on_nothing_downloaded: true,
            ready_file_name: DEFAULT_READY_FILE_NAME.to_string(),
            max_concurrent_post_processing: DEFAULT_POST_PROCESSING_CONCURRENCY,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        let name = self.ready_file_name.as_str();
        if name.is_empty() {
            return Err(OrchestrationError::InvalidConfig {
                field: "ready_file_name",
                reason: "must not be empty",
            });
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(OrchestrationError::InvalidConfig {
                field: "ready_file_name",
                reason: "must be a plain file name",
            });
        }
        if self.max_concurrent_post_processing == 0 {
            return Err(OrchestrationError::InvalidConfig {
                field: "max_concurrent_post_processing",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// What a successful [`DownloadOrchestrator::ensure_resources_ready`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    /// The marker already matched; nothing was downloaded.
    AlreadyReady,
    Materialized { files_downloaded: usize },
}

/// Composes a downloader, a descriptor and post-processors around one destination.
pub struct DownloadOrchestrator {
    destination: PathBuf,
    downloader: Arc<dyn ResourceDownloader>,
    descriptor: Arc<dyn ResourceDescriptor>,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("destination", &self.destination)
            .field("descriptor", &self.descriptor)
            .field("post_processors", &self.post_processors.len())
            .field("config", &self.config)
            .finish()
    }
}

impl DownloadOrchestrator {
    pub fn new(
        destination: impl Into<PathBuf>,
        downloader: Arc<dyn ResourceDownloader>,
        descriptor: Arc<dyn ResourceDescriptor>,
    ) -> Self {
        Self {
            destination: destination.into(),
            downloader,
            descriptor,
            post_processors: Vec::new(),
            config: OrchestratorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a processor. Processors run in insertion order for each file.
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    #[must_use]
    pub fn with_post_processors(
        mut self,
        processors: impl IntoIterator<Item = Arc<dyn PostProcessor>>,
    ) -> Self {
        self.post_processors.extend(processors);
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn flagger(&self) -> ReadinessFlagger {
        ReadinessFlagger::new(
            &self.destination,
            &self.config.ready_file_name,
            self.descriptor.as_ref(),
        )
    }

    /// Read-only readiness check; never touches the destination.
    pub fn resources_are_ready(&self) -> Result<bool, OrchestrationError> {
        self.config.validate()?;
        self.flagger().is_ready()
    }

    /// Downloads and post-processes the resource unless the destination is already ready.
    pub async fn ensure_resources_ready(&self) -> Result<RunReport, OrchestrationError> {
        self.config.validate()?;
        let flagger = self.flagger();
        if flagger.is_ready()? {
            info!(
                descriptor = %self.descriptor.canonical_string(),
                destination = %self.destination.display(),
                "Resources already flagged as ready, skipping download"
            );
            return Ok(RunReport::AlreadyReady);
        }

        let span = info_span!(
            "orchestration_run",
            run_id = %Uuid::new_v4(),
            descriptor = %self.descriptor.canonical_string(),
            destination = %self.destination.display(),
        );
        self.materialise(flagger).instrument(span).await
    }

    async fn materialise(
        &self,
        flagger: ReadinessFlagger,
    ) -> Result<RunReport, OrchestrationError> {
        info!("Starting download run");
        flagger.invalidate()?;
        destination::ensure_dir(&self.destination)?;
        if self.config.clear_destination_before_download {
            destination::clear_dir_blocking(&self.destination).await?;
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_post_processing));
        let processors: Arc<[Arc<dyn PostProcessor>]> = self.post_processors.clone().into();
        let mut tasks = JoinSet::new();
        let mut files_downloaded = 0usize;
        let mut download_failure = None;

        let mut downloads = self.downloader.produce(&self.destination);
        while let Some(item) = downloads.next().await {
            match item {
                Ok(path) => {
                    files_downloaded += 1;
                    debug!(path = %path.display(), "Scheduling post-processing");
                    tasks.spawn(
                        post_process(path, Arc::clone(&processors), Arc::clone(&permits))
                            .in_current_span(),
                    );
                }
                Err(e) => {
                    error!(error = ?e, files_downloaded, "Download stream failed");
                    download_failure = Some(e);
                    break;
                }
            }
        }
        drop(downloads);

        let failures = join_all(&mut tasks).await;

        if let Some(source) = download_failure {
            if !failures.is_empty() {
                warn!(
                    failed = failures.len(),
                    "Post-processing also failed during the aborted run"
                );
            }
            return Err(OrchestrationError::Download {
                source,
                post_processing: failures,
            });
        }
        if !failures.is_empty() {
            error!(failed = failures.len(), files_downloaded, "Post-processing failed");
            return Err(OrchestrationError::PostProcessing { failures });
        }

        if files_downloaded == 0 {
            warn!("Downloaded zero files. Check your configuration and that the source contains resources.");
            if self.config.error_on_nothing_downloaded {
                return Err(OrchestrationError::NothingDownloaded {
                    destination: self.destination.clone(),
                });
            }
        }

        flagger.flag_ready()?;
        info!(files_downloaded, "Flagged downloaded resources as ready");
        Ok(RunReport::Materialized { files_downloaded })
    }
}

/// Barrier: waits for every task and collects the failures.
async fn join_all(tasks: &mut JoinSet<Result<(), PostProcessFailure>>) -> Vec<PostProcessFailure> {
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => failures.push(failure),
            Err(e) => {
                error!(error = ?e, "Post-processing task did not complete");
                failures.push(PostProcessFailure {
                    path: PathBuf::new(),
                    message: format!("task did not complete: {e}"),
                });
            }
        }
    }
    failures
}

/// Runs every processor on one file, stopping at the first failure or panic.
async fn post_process(
    path: PathBuf,
    processors: Arc<[Arc<dyn PostProcessor>]>,
    permits: Arc<Semaphore>,
) -> Result<(), PostProcessFailure> {
    let _permit = permits.acquire_owned().await.map_err(|_| PostProcessFailure {
        path: path.clone(),
        message: "post-processing pool closed".to_string(),
    })?;

    for processor in processors.iter() {
        let message = match AssertUnwindSafe(processor.process(&path)).catch_unwind().await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => error_chain(&e),
            Err(panic) => format!("processor panicked: {}", panic_message(panic.as_ref())),
        };
        error!(path = %path.display(), error = %message, "Post-processing failed");
        return Err(PostProcessFailure { path, message });
    }
    debug!(path = %path.display(), "Post-processing complete");
    Ok(())
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
