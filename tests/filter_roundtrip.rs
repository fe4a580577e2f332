//! Filtered backups through the full pipeline.

mod common;

use std::fs;

use dirvault::{BackupSystem, FilterOptions};

/// Builds the keyword-scenario tree with regex-special characters in names.
fn keyword_tree() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    for (name, contents) in [
        ("project_alpha_v1.code", "alpha v1"),
        ("project_beta_v2.code", "beta v2"),
        ("notes_alpha.txt", "alpha notes"),
        ("calc(v1+2).cpp", "int main() {}"),
        ("vacation.jpg", "not a real jpeg"),
    ] {
        fs::write(src.join(name), contents).unwrap();
    }
    (dir, src)
}

#[test]
fn keyword_filter_with_regex_special_characters() {
    let (dir, src) = keyword_tree();

    let mut system = BackupSystem::new();
    system.set_filter(FilterOptions {
        name_keywords: vec!["alpha".into(), "(v1+2)".into()],
        ..Default::default()
    });

    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));

    // The parenthesized keyword must be treated literally, not as regex.
    assert_eq!(
        common::file_paths_under(&dst.join("src")),
        [
            "calc(v1+2).cpp".to_string(),
            "notes_alpha.txt".to_string(),
            "project_alpha_v1.code".to_string(),
        ]
    );
}

#[test]
fn suffix_filter_keeps_directory_structure() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("logs")).unwrap();
    fs::write(src.join("logs/app.log"), b"log line").unwrap();
    fs::write(src.join("logs/app.txt"), b"text").unwrap();
    fs::write(src.join("readme.md"), b"docs").unwrap();

    let mut system = BackupSystem::new();
    system.set_filter(FilterOptions {
        suffixes: vec![".log".into()],
        ..Default::default()
    });

    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    assert_eq!(
        common::file_paths_under(&dst.join("src")),
        ["logs/app.log".to_string()]
    );
}

#[test]
fn size_filter_through_pipeline() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("small.bin"), vec![0u8; 10]).unwrap();
    fs::write(src.join("large.bin"), vec![0u8; 10_000]).unwrap();

    let mut system = BackupSystem::new();
    system.set_filter(FilterOptions {
        min_size: 100,
        ..Default::default()
    });

    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    assert_eq!(
        common::file_paths_under(&dst.join("src")),
        ["large.bin".to_string()]
    );
}

#[test]
fn filter_rejecting_everything_fails_backup() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_filter(FilterOptions {
        suffixes: vec![".nothing-matches-this".into()],
        ..Default::default()
    });

    assert!(!system.backup(&src, dir.path().join("backup.bin")));
    assert!(!dir.path().join("backup.bin").exists());
}

#[test]
fn malformed_regex_recovers_by_dropping_name_predicate() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_filter(FilterOptions {
        name_regex: "[unclosed".into(),
        ..Default::default()
    });

    // The name predicate is dropped; everything else passes.
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    common::assert_sample_tree(&dst.join("src"));
}
