//! Directory traversal producing [`FileRecord`]s.
//!
//! The traverser walks a root directory depth-first in pre-order, so every
//! directory record appears before the records of its children. Symlinks are
//! recorded, never followed. A small deny-list of filesystem housekeeping
//! names is skipped at every level.

use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use walkdir::WalkDir;

use crate::record::{FileKind, FileRecord, resolve_group_name, resolve_user_name};
use crate::{Error, Result};

/// Names skipped at every directory level.
const DENY_LIST: &[&str] = &[".DS_Store", ".localized"];

/// Walks a directory tree and produces file records in depth-first pre-order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Traverser;

impl Traverser {
    /// Creates a new traverser.
    pub fn new() -> Self {
        Self
    }

    /// Walks `root` and returns one record per entry below it.
    ///
    /// Paths in the returned records are relative to `root` (the root itself
    /// is not included). Entries are sorted by file name within each
    /// directory so archive order is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `root` cannot be stat'd or an intermediate
    /// directory cannot be opened.
    pub fn traverse(&self, root: impl AsRef<Path>) -> Result<Vec<FileRecord>> {
        let root = root.as_ref();
        // Fail fast with a plain Io error when the root itself is missing.
        std::fs::symlink_metadata(root)?;

        let mut records = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || e.file_name()
                        .to_str()
                        .map(|name| !DENY_LIST.contains(&name))
                        .unwrap_or(true)
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let meta = entry.metadata().map_err(|e| {
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("stat failed")),
                )
            })?;

            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("walkdir entry is always under its root")
                .to_string_lossy()
                .into_owned();

            records.push(build_record(rel, entry.path(), &meta)?);
        }

        Ok(records)
    }
}

fn build_record(
    relative_path: String,
    path: &Path,
    meta: &std::fs::Metadata,
) -> Result<FileRecord> {
    let file_type = meta.file_type();

    let kind = if file_type.is_file() {
        FileKind::Regular
    } else if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_char_device() {
        FileKind::CharDevice
    } else if file_type.is_block_device() {
        FileKind::BlockDevice
    } else if file_type.is_fifo() {
        FileKind::Fifo
    } else if file_type.is_socket() {
        FileKind::Socket
    } else {
        FileKind::Unknown
    };

    let link_target = if kind == FileKind::Symlink {
        Some(
            std::fs::read_link(path)?
                .to_string_lossy()
                .into_owned(),
        )
    } else {
        None
    };

    let device = if kind.is_device() {
        Some(split_dev(meta.rdev()))
    } else {
        None
    };

    let uid = meta.uid();
    let gid = meta.gid();

    Ok(FileRecord {
        relative_path,
        absolute_path: path.to_path_buf(),
        kind,
        size: if kind == FileKind::Regular { meta.len() } else { 0 },
        mode: meta.mode(),
        mtime: meta.mtime(),
        uid,
        gid,
        owner_name: resolve_user_name(uid),
        group_name: resolve_group_name(gid),
        link_target,
        device,
    })
}

/// Splits a raw `st_rdev` into (major, minor) using the glibc encoding.
fn split_dev(dev: u64) -> (u32, u32) {
    let major = (((dev >> 8) & 0xfff) | ((dev >> 32) & 0xffff_f000)) as u32;
    let minor = ((dev & 0xff) | ((dev >> 12) & 0xffff_ff00)) as u32;
    (major, minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_traverse_preorder_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/b.bin"), [0u8, 1, 2]).unwrap();

        let records = Traverser::new().traverse(root).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(paths, ["a.txt", "sub", "sub/b.bin"]);

        let a = &records[0];
        assert!(a.is_regular());
        assert_eq!(a.size, 5);
        assert!(records[1].is_dir());
        assert_eq!(records[1].size, 0);
    }

    #[test]
    fn test_traverse_records_symlink_without_following() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("target.txt"), b"data").unwrap();
        symlink("target.txt", root.join("link")).unwrap();

        let records = Traverser::new().traverse(root).unwrap();
        let link = records
            .iter()
            .find(|r| r.relative_path == "link")
            .expect("symlink record");
        assert_eq!(link.kind, FileKind::Symlink);
        assert_eq!(link.link_target.as_deref(), Some("target.txt"));
    }

    #[test]
    fn test_traverse_skips_deny_list() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".DS_Store"), b"junk").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/.DS_Store"), b"junk").unwrap();
        fs::write(root.join("sub/keep.txt"), b"keep").unwrap();

        let records = Traverser::new().traverse(root).unwrap();
        assert!(records.iter().all(|r| !r.relative_path.ends_with(".DS_Store")));
        assert!(records.iter().any(|r| r.relative_path == "sub/keep.txt"));
    }

    #[test]
    fn test_traverse_missing_root_is_io_error() {
        let err = Traverser::new()
            .traverse("/nonexistent/definitely/missing")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
