/// # readyfetch CLI
///
/// Command parsing and glue around [`readyfetch_core`]. The binary reads one
/// YAML config, assembles a [`DownloadOrchestrator`] from it, and either
/// materialises the configured folder (`ensure`) or reports whether it already
/// is (`status`).
///
/// All download, readiness and post-processing logic lives in `readyfetch-core`.
/// Call [`run`] with a constructed [`Cli`] for programmatic or test use.
use crate::load_config::{load_config, CliConfig, PostProcessingStep, SourceSection};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use readyfetch_core::contract::{PostProcessor, ResourceDownloader};
use readyfetch_core::remote::{
    FilesystemObjectStore, PrefixDownloader, S3FolderDownloader, S3ObjectStore, S3Settings,
};
use readyfetch_core::{DownloadOrchestrator, FileUnzipper, RunReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for readyfetch: download a remote folder into a local directory exactly once.
#[derive(Parser)]
#[clap(
    name = "readyfetch",
    version,
    about = "Materialise a remote folder locally, once, and mark it ready"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download and post-process the configured folder unless it is already ready
    Ensure {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Print whether the destination already holds the configured folder
    Status {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Async CLI entrypoint shared by `main()` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Ensure { config } => {
            let config = load_config(config)?;
            tracing::info!(
                command = "ensure",
                destination = ?config.destination,
                "Ensuring resources"
            );
            let orchestrator = build_orchestrator(&config).await?;
            match orchestrator.ensure_resources_ready().await {
                Ok(RunReport::AlreadyReady) => {
                    println!("already ready: {}", config.destination.display());
                    Ok(())
                }
                Ok(RunReport::Materialized { files_downloaded }) => {
                    println!(
                        "downloaded {files_downloaded} file(s) into {}",
                        config.destination.display()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "ensure", error = %e, "Ensuring resources failed");
                    Err(e).context("Failed to make resources ready")
                }
            }
        }
        Commands::Status { config } => {
            let config = load_config(config)?;
            let orchestrator = build_orchestrator(&config).await?;
            let ready = orchestrator
                .resources_are_ready()
                .context("Failed to read readiness marker")?;
            tracing::info!(command = "status", ready, "Checked readiness");
            println!("{}", if ready { "ready" } else { "not ready" });
            Ok(())
        }
    }
}

/// Assembles the orchestrator described by a loaded config.
pub async fn build_orchestrator(config: &CliConfig) -> Result<DownloadOrchestrator> {
    let downloader: Arc<dyn ResourceDownloader> = match &config.source {
        SourceSection::S3 {
            bucket,
            folder,
            region,
            endpoint,
            force_path_style,
            recursive,
        } => {
            let settings = S3Settings {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                force_path_style: *force_path_style,
            };
            let store = S3ObjectStore::from_settings(&settings).await;
            Arc::new(S3FolderDownloader::s3(store, folder).recursive(*recursive))
        }
        SourceSection::Local {
            root,
            folder,
            recursive,
        } => {
            reject_overlapping_local_source(root, folder, &config.destination)?;
            Arc::new(
                PrefixDownloader::new(FilesystemObjectStore::new(root.clone()), folder)
                    .recursive(*recursive),
            )
        }
    };

    let processors = config
        .post_processing
        .iter()
        .map(|step| -> Arc<dyn PostProcessor> {
            match step {
                PostProcessingStep::Unzip { delete_archive } => {
                    Arc::new(FileUnzipper::new(*delete_archive))
                }
            }
        });

    Ok(DownloadOrchestrator::new(
        config.destination.clone(),
        downloader,
        Arc::new(config.source.descriptor()),
    )
    .with_config(config.options.clone())
    .with_post_processors(processors))
}

/// A local source folder and the destination must not contain one another:
/// the walk would list its own copies, and clearing would delete the source.
fn reject_overlapping_local_source(root: &Path, folder: &str, destination: &Path) -> Result<()> {
    let source = resolve(&root.join(folder.trim_start_matches('/')));
    let target = resolve(destination);
    if target.starts_with(&source) || source.starts_with(&target) {
        tracing::error!(
            source = ?source,
            destination = ?target,
            "Local source overlaps destination"
        );
        anyhow::bail!(
            "destination {} overlaps local source {}",
            target.display(),
            source.display()
        );
    }
    Ok(())
}

/// Canonicalises the longest existing ancestor of `path` and re-appends the
/// components that do not exist yet.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}
