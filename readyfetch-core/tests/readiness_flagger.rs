use std::fs;

use tempfile::tempdir;

use readyfetch_core::{
    FolderDescriptor, ReadinessFlagger, ResourceDescriptor, DEFAULT_READY_FILE_NAME,
};

#[test]
fn test_absent_marker_is_not_ready() {
    let tmp = tempdir().unwrap();
    let flagger = ReadinessFlagger::new(
        tmp.path(),
        DEFAULT_READY_FILE_NAME,
        &FolderDescriptor::s3("b", "f"),
    );
    assert!(!flagger.is_ready().unwrap());
}

#[test]
fn test_flag_then_check_round_trips_exact_content() {
    let tmp = tempdir().unwrap();
    let descriptor = FolderDescriptor::s3("b", "f");
    let flagger = ReadinessFlagger::new(tmp.path(), DEFAULT_READY_FILE_NAME, &descriptor);

    flagger.flag_ready().unwrap();

    assert!(flagger.is_ready().unwrap());
    assert_eq!(
        fs::read(tmp.path().join(".ready")).unwrap(),
        descriptor.canonical_string().into_bytes()
    );
    // No staging files are left behind.
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[test]
fn test_flag_overwrites_previous_descriptor() {
    let tmp = tempdir().unwrap();
    let old = ReadinessFlagger::new(tmp.path(), ".ready", &FolderDescriptor::s3("b", "old"));
    let new = ReadinessFlagger::new(tmp.path(), ".ready", &FolderDescriptor::s3("b", "new"));

    old.flag_ready().unwrap();
    new.flag_ready().unwrap();

    assert!(new.is_ready().unwrap());
    assert!(!old.is_ready().unwrap());
}

#[test]
fn test_non_utf8_marker_is_simply_not_ready() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join(".ready"), [0xff, 0xfe, 0x00]).unwrap();
    let flagger = ReadinessFlagger::new(tmp.path(), ".ready", &FolderDescriptor::s3("b", "f"));
    assert!(!flagger.is_ready().unwrap());
}

#[test]
fn test_invalidate_tolerates_missing_marker() {
    let tmp = tempdir().unwrap();
    let flagger = ReadinessFlagger::new(tmp.path(), ".ready", &FolderDescriptor::s3("b", "f"));
    flagger.invalidate().unwrap();
    flagger.flag_ready().unwrap();
    flagger.invalidate().unwrap();
    assert!(!flagger.marker_path().exists());
}

#[test]
fn test_marker_that_is_a_directory_is_an_error() {
    let tmp = tempdir().unwrap();
    fs::create_dir(tmp.path().join(".ready")).unwrap();
    let flagger = ReadinessFlagger::new(tmp.path(), ".ready", &FolderDescriptor::s3("b", "f"));
    assert!(flagger.is_ready().is_err());
}

#[test]
fn test_destination_that_is_a_file_has_no_marker() {
    let tmp = tempdir().unwrap();
    let occupied = tmp.path().join("occupied");
    fs::write(&occupied, "plain file").unwrap();
    let flagger = ReadinessFlagger::new(&occupied, ".ready", &FolderDescriptor::s3("b", "f"));

    assert!(!flagger.is_ready().unwrap());
    flagger.invalidate().unwrap();
    assert!(flagger.flag_ready().is_err());
}
