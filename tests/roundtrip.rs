//! End-to-end backup → restore scenarios over the full pipeline.
//!
//! Covers the plain and encrypted round-trips, wrong-password behavior,
//! verification, corruption detection, and metadata fidelity.

mod common;

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

use dirvault::{Algorithm, BackupSystem};

#[test]
fn plain_roundtrip_default_algorithm() {
    let (dir, src) = common::sample_tree();

    let system = BackupSystem::new();
    let artifact = dir.path().join("out/backup.bin");
    assert!(system.backup(&src, &artifact));
    assert!(artifact.is_file());

    // Default algorithm is LZSS; the artifact is tagged with its code.
    let bytes = fs::read(&artifact).unwrap();
    assert_eq!(bytes[0], Algorithm::Lzss.code());

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    common::assert_sample_tree(&dst.join("src"));
}

#[test]
fn roundtrip_every_algorithm() {
    for algo in [Algorithm::Huffman, Algorithm::Lzss, Algorithm::Joined] {
        let (dir, src) = common::sample_tree();

        let mut system = BackupSystem::new();
        system.set_compression_algorithm(algo);

        let artifact = dir.path().join("backup.bin");
        assert!(system.backup(&src, &artifact), "{} backup", algo.name());

        let dst = dir.path().join("dst");
        assert!(system.restore(&artifact, &dst), "{} restore", algo.name());
        common::assert_sample_tree(&dst.join("src"));
    }
}

#[test]
fn encrypted_roundtrip_and_verify() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_password("MySecretPass");

    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));
    assert!(system.verify(&artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    common::assert_sample_tree(&dst.join("src"));
}

#[test]
fn wrong_password_fails_and_writes_nothing() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_password("MySecretPass");
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let mut wrong = BackupSystem::new();
    wrong.set_password("WrongPassword");

    let dst = dir.path().join("dst");
    let err = wrong.try_restore(&artifact, &dst).unwrap_err();
    // Padding validation catches a wrong password in all but ~1/256 of
    // cases; the rare survivor produces garbage that fails the structural
    // checks instead. Either way the restore must fail loudly.
    assert!(
        err.is_encryption_error() || err.is_corruption(),
        "got {err:?}"
    );
    assert!(!wrong.verify(&artifact));

    // Nothing materialized under the destination.
    assert!(!dst.join("src").exists());
}

#[test]
fn encrypted_artifact_is_opaque() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_password("MySecretPass");
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let bytes = fs::read(&artifact).unwrap();
    // AES-CBC output is always block aligned.
    assert_eq!(bytes.len() % 16, 0);

    // An unencrypted system cannot make sense of it.
    let plain = BackupSystem::new();
    assert!(!plain.verify(&artifact));
}

#[test]
fn corrupted_ciphertext_is_detected() {
    let (dir, src) = common::sample_tree();

    let mut system = BackupSystem::new();
    system.set_password("MySecretPass");
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let original = fs::read(&artifact).unwrap();

    // Flip one byte in several positions: start, middle, end.
    for flip_at in [0, original.len() / 2, original.len() - 1] {
        let mut tampered = original.clone();
        tampered[flip_at] ^= 0x01;
        fs::write(&artifact, &tampered).unwrap();

        let dst = dir.path().join(format!("dst_{flip_at}"));
        let result = system.try_restore(&artifact, &dst);
        // Never silent corruption: decryption, frame, or archive checks
        // must catch the flip.
        assert!(result.is_err(), "flip at {flip_at} went unnoticed");
    }
}

#[test]
fn corrupted_plain_artifact_is_detected() {
    let (dir, src) = common::sample_tree();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let mut bytes = fs::read(&artifact).unwrap();
    bytes[0] = 0x7B; // invalid algorithm byte
    fs::write(&artifact, &bytes).unwrap();

    assert!(!system.verify(&artifact));
    assert!(!system.restore(&artifact, dir.path().join("dst")));
}

#[test]
fn restore_preserves_modes_and_mtimes() {
    let (dir, src) = common::sample_tree();
    fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o750)).unwrap();
    let stamp = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(src.join("b.log"), stamp).unwrap();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));

    let meta = fs::metadata(dst.join("src/a.txt")).unwrap();
    assert_eq!(meta.mode() & 0o777, 0o750);
    let meta = fs::metadata(dst.join("src/b.log")).unwrap();
    assert_eq!(meta.mtime(), 1_600_000_000);
}

#[test]
fn restore_twice_suffixes_the_root() {
    let (dir, src) = common::sample_tree();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));
    assert!(system.restore(&artifact, &dst));

    common::assert_sample_tree(&dst.join("src"));
    common::assert_sample_tree(&dst.join("src_1"));
}

#[test]
fn backup_into_existing_directory_names_after_root() {
    let (dir, src) = common::sample_tree();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let system = BackupSystem::new();
    assert!(system.backup(&src, &out));
    assert!(out.join("src.bin").is_file());

    // A second backup into the same directory gets a numbered name.
    assert!(system.backup(&src, &out));
    assert!(out.join("src_1.bin").is_file());
}

#[test]
fn long_paths_survive_the_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let deep = src.join("d".repeat(60)).join("e".repeat(60));
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("f".repeat(40)), b"deep contents").unwrap();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));

    let restored = dst
        .join("src")
        .join("d".repeat(60))
        .join("e".repeat(60))
        .join("f".repeat(40));
    assert_eq!(fs::read(restored).unwrap(), b"deep contents");
}

#[test]
fn symlinks_restore_with_target_string_intact() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("real.txt"), b"pointed at").unwrap();
    std::os::unix::fs::symlink("real.txt", src.join("link")).unwrap();
    std::os::unix::fs::symlink("../outside", src.join("up_link")).unwrap();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let dst = dir.path().join("dst");
    assert!(system.restore(&artifact, &dst));

    assert_eq!(
        fs::read_link(dst.join("src/link")).unwrap().to_str().unwrap(),
        "real.txt"
    );
    // The target string is preserved verbatim, even when it points up.
    assert_eq!(
        fs::read_link(dst.join("src/up_link"))
            .unwrap()
            .to_str()
            .unwrap(),
        "../outside"
    );
}

#[test]
fn verify_does_not_touch_the_destination() {
    let (dir, src) = common::sample_tree();

    let system = BackupSystem::new();
    let artifact = dir.path().join("backup.bin");
    assert!(system.backup(&src, &artifact));

    let before = common::file_names(dir.path());
    assert!(system.verify(&artifact));
    assert_eq!(common::file_names(dir.path()), before);
}

#[test]
fn typed_errors_surface_through_try_variants() {
    let dir = tempfile::tempdir().unwrap();
    let system = BackupSystem::new();

    // Missing source.
    let err = system
        .try_backup(&dir.path().join("missing"), &dir.path().join("o.bin"))
        .unwrap_err();
    assert!(matches!(err, dirvault::Error::Io(_)));

    // Missing artifact.
    let err = system
        .try_restore(&dir.path().join("missing.bin"), dir.path())
        .unwrap_err();
    assert!(matches!(err, dirvault::Error::Io(_)));
}
