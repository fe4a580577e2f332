//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and uses only a subset of the helpers.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// The canonical three-file source tree used by the round-trip scenarios.
///
/// ```text
/// src/a.txt      = "Content of file 1"
/// src/b.log      = "Log data..."
/// src/sub/c.bin  = 0x00 0x01 0x02
/// ```
pub fn sample_tree() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), b"Content of file 1").unwrap();
    fs::write(src.join("b.log"), b"Log data...").unwrap();
    fs::write(src.join("sub/c.bin"), [0x00u8, 0x01, 0x02]).unwrap();
    (dir, src)
}

/// Asserts the restored `src` tree equals the sample tree byte-for-byte.
pub fn assert_sample_tree(restored_root: &Path) {
    assert_eq!(
        fs::read(restored_root.join("a.txt")).unwrap(),
        b"Content of file 1"
    );
    assert_eq!(fs::read(restored_root.join("b.log")).unwrap(), b"Log data...");
    assert_eq!(
        fs::read(restored_root.join("sub/c.bin")).unwrap(),
        [0x00u8, 0x01, 0x02]
    );
}

/// Lists the file names (not paths) directly under `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Collects relative paths of all regular files under `root`, sorted.
pub fn file_paths_under(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    collect_files(root, root, &mut out);
    out.sort();
    out
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if entry.file_type().unwrap().is_dir() {
            collect_files(root, &path, out);
        } else {
            out.push(
                path.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned(),
            );
        }
    }
}
