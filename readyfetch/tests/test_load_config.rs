use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use readyfetch::load_config::{load_config, PostProcessingStep, SourceSection};
use readyfetch_core::{OrchestratorConfig, ResourceDescriptor};

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// A full S3 config maps every section onto typed settings.
#[test]
fn test_load_config_s3_source_with_options_and_post_processing() {
    let config_file = config_file(
        r#"
destination: ./data/models
source:
  type: s3
  bucket: my-bucket
  folder: models/v3
  region: eu-west-1
  endpoint: http://localhost:9000
options:
  clear_destination_before_download: true
  max_concurrent_post_processing: 4
post_processing:
  - type: unzip
    delete_archive: true
  - type: unzip
"#,
    );

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.destination, PathBuf::from("./data/models"));
    assert_eq!(
        config.source,
        SourceSection::S3 {
            bucket: "my-bucket".into(),
            folder: "models/v3".into(),
            region: Some("eu-west-1".into()),
            endpoint: Some("http://localhost:9000".into()),
            force_path_style: false,
            recursive: true,
        }
    );
    assert!(config.options.clear_destination_before_download);
    assert!(config.options.error_on_nothing_downloaded);
    assert_eq!(config.options.max_concurrent_post_processing, 4);
    assert_eq!(config.options.ready_file_name, ".ready");
    assert_eq!(
        config.post_processing,
        vec![
            PostProcessingStep::Unzip {
                delete_archive: true
            },
            PostProcessingStep::Unzip {
                delete_archive: false
            },
        ]
    );
    assert_eq!(
        config.source.descriptor().canonical_string(),
        r#"{"s3":{"bucket":"my-bucket","folder":"models/v3"}}"#
    );
}

/// Options and post-processing are optional.
#[test]
fn test_load_config_minimal_local_source() {
    let config_file = config_file(
        r#"
destination: /srv/cache
source:
  type: local
  root: /mnt/mirror
  folder: datasets
  recursive: false
"#,
    );

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.options, OrchestratorConfig::default());
    assert!(config.post_processing.is_empty());
    match &config.source {
        SourceSection::Local {
            root,
            folder,
            recursive,
        } => {
            assert_eq!(root, &PathBuf::from("/mnt/mirror"));
            assert_eq!(folder, "datasets");
            assert!(!recursive);
        }
        other => panic!("Unexpected source: {other:?}"),
    }
}

#[test]
fn test_load_config_rejects_unknown_source_type() {
    let config_file = config_file(
        r#"
destination: ./data
source:
  type: ftp
  folder: x
"#,
    );

    let err = load_config(config_file.path()).unwrap_err();
    assert!(
        err.to_string().contains("parse"),
        "Parse error expected, got: {err}"
    );
}

#[test]
fn test_load_config_rejects_invalid_options() {
    let config_file = config_file(
        r#"
destination: ./data
source:
  type: local
  root: /tmp
  folder: x
options:
  ready_file_name: ../escape
"#,
    );

    let err = load_config(config_file.path()).unwrap_err();
    assert!(
        err.to_string().contains("Invalid options"),
        "Validation error expected, got: {err}"
    );
}

#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = config_file("not-yaml: [:::");

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
