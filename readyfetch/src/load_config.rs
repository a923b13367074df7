/// `load_config` module: parses the static YAML configuration into typed CLI settings.
///
/// This is the only place where user-supplied YAML is read. Everything past this
/// module works with [`CliConfig`] and the strongly-typed orchestrator settings
/// from `readyfetch-core`.
///
/// # Errors
/// Failures are returned as `anyhow::Error` with the offending path in the
/// message, and surface at the CLI boundary.
use anyhow::Result;
use readyfetch_core::{FolderDescriptor, OrchestratorConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Local directory the remote folder is materialised into.
    pub destination: PathBuf,
    pub source: SourceSection,
    #[serde(default)]
    pub options: OrchestratorConfig,
    /// Applied to every downloaded file, in the listed order.
    #[serde(default)]
    pub post_processing: Vec<PostProcessingStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum SourceSection {
    S3 {
        bucket: String,
        folder: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        force_path_style: bool,
        #[serde(default = "recursive_by_default")]
        recursive: bool,
    },
    /// A directory tree laid out like a bucket, mostly useful for testing and mirrors.
    Local {
        root: PathBuf,
        folder: String,
        #[serde(default = "recursive_by_default")]
        recursive: bool,
    },
}

fn recursive_by_default() -> bool {
    true
}

impl SourceSection {
    pub fn descriptor(&self) -> FolderDescriptor {
        match self {
            SourceSection::S3 { bucket, folder, .. } => FolderDescriptor::s3(bucket, folder),
            SourceSection::Local { root, folder, .. } => {
                FolderDescriptor::local(root.display().to_string(), folder)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum PostProcessingStep {
    Unzip {
        #[serde(default)]
        delete_archive: bool,
    },
}

/// Loads the YAML config file at `path`. Orchestrator options are validated
/// here so that a bad file fails before anything touches the destination.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Err(e) = config.options.validate() {
        error!(error = %e, config_path = ?path_ref, "Invalid orchestrator options");
        return Err(anyhow::anyhow!("Invalid options in {:?}: {e}", path_ref));
    }

    Ok(config)
}
