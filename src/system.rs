//! The backup pipeline controller.
//!
//! [`BackupSystem`] composes the data plane in both directions:
//!
//! * **backup**: traverse → filter → pack (ustar, in memory) → compress →
//!   encrypt (when a password is set) → atomic artifact write;
//! * **restore**: read → decrypt → decompress → unpack, the exact inverse
//!   in mirrored order;
//! * **verify**: decrypt + decompress + structural check, no disk writes.
//!
//! The public operations return `bool` and log failures; the `try_` variants
//! expose the typed errors for callers that need them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::codec::{self, Algorithm};
use crate::crypto::{Encryptor, Password};
use crate::filter::{Filter, FilterOptions};
use crate::tar::{BLOCK_SIZE, TarHeader, TarReader, TarWriter};
use crate::traverse::Traverser;
use crate::{Error, Result};

/// Root name used when the source path has no final component.
const FALLBACK_ROOT: &str = "backup_root";

/// One-shot backup/restore/verify pipeline.
///
/// Each instance owns its configuration: compression algorithm (LZSS by
/// default), optional password, and optional filter. Instances are
/// independent; the scheduler gives every task its own.
#[derive(Debug, Default)]
pub struct BackupSystem {
    algorithm: Algorithm,
    password: Option<Password>,
    filter: Filter,
}

impl BackupSystem {
    /// Creates a system with default settings: LZSS, no password, no filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the compression algorithm.
    pub fn set_compression_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    /// Sets the encryption password; an empty string disables encryption.
    pub fn set_password(&mut self, password: &str) {
        self.password = if password.is_empty() {
            None
        } else {
            Some(Password::new(password))
        };
    }

    /// Installs filter options and enables filtering.
    pub fn set_filter(&mut self, options: FilterOptions) {
        self.filter = Filter::new(options);
    }

    /// Backs up `src_dir` into an artifact, resolving `dst_path` per the
    /// destination policy. Returns `true` on success.
    pub fn backup(&self, src_dir: impl AsRef<Path>, dst_path: impl AsRef<Path>) -> bool {
        match self.try_backup(src_dir.as_ref(), dst_path.as_ref()) {
            Ok(artifact) => {
                log::info!("backup complete: {}", artifact.display());
                true
            }
            Err(e) => {
                log::error!("backup failed: {e}");
                false
            }
        }
    }

    /// Restores an artifact under `dst_dir`. Returns `true` on success.
    pub fn restore(&self, src_file: impl AsRef<Path>, dst_dir: impl AsRef<Path>) -> bool {
        match self.try_restore(src_file.as_ref(), dst_dir.as_ref()) {
            Ok(dest) => {
                log::info!("restore complete: {}", dest.display());
                true
            }
            Err(e) => {
                log::error!("restore failed: {e}");
                false
            }
        }
    }

    /// Structurally verifies an artifact. Returns `true` when it decrypts,
    /// decompresses, and carries the ustar magic.
    pub fn verify(&self, src_file: impl AsRef<Path>) -> bool {
        match self.try_verify(src_file.as_ref()) {
            Ok(()) => {
                log::info!("artifact verified: {}", src_file.as_ref().display());
                true
            }
            Err(e) => {
                log::error!("verification failed: {e}");
                false
            }
        }
    }

    /// Typed-error form of [`backup`](Self::backup); returns the resolved
    /// artifact path.
    pub fn try_backup(&self, src_dir: &Path, dst_path: &Path) -> Result<PathBuf> {
        let root = root_name(src_dir);
        let artifact_path = self.resolve_destination(src_dir, dst_path, &root)?;
        log::info!(
            "starting backup: {} -> {} ({})",
            src_dir.display(),
            artifact_path.display(),
            self.algorithm.name()
        );

        let records = Traverser::new().traverse(src_dir)?;
        if records.is_empty() {
            return Err(empty_source(src_dir, "source directory is empty"));
        }

        let mut records = self.filter.apply(records);
        if records.is_empty() {
            return Err(empty_source(src_dir, "no files match the filter"));
        }
        log::debug!("{} records after filtering", records.len());

        // Archive paths are rooted at the source's name so restore can
        // recreate a single top-level directory.
        for record in &mut records {
            record.relative_path = format!("{root}/{}", record.relative_path);
        }

        let tar_bytes = TarWriter::new(Vec::new()).pack(&records)?;
        log::debug!("packed {} bytes", tar_bytes.len());

        let compressed = codec::compress(&tar_bytes, self.algorithm);
        drop(tar_bytes);
        log::debug!("compressed to {} bytes", compressed.len());

        let payload = match &self.password {
            Some(password) => Encryptor::initialized(password).encrypt(&compressed)?,
            None => compressed,
        };

        write_atomic(&artifact_path, &payload)?;
        Ok(artifact_path)
    }

    /// Typed-error form of [`restore`](Self::restore); returns the directory
    /// the tree was materialized under.
    pub fn try_restore(&self, src_file: &Path, dst_dir: &Path) -> Result<PathBuf> {
        log::info!(
            "starting restore: {} -> {}",
            src_file.display(),
            dst_dir.display()
        );
        let tar_bytes = self.read_payload(src_file)?;

        let root = peek_root_name(&tar_bytes)?;
        fs::create_dir_all(dst_dir)?;
        let final_dest = dst_dir.join(&root);

        if !final_dest.exists() {
            TarReader::new(tar_bytes.as_slice()).unpack(dst_dir)?;
            return Ok(final_dest);
        }

        // The root already exists: unpack into a scratch directory, then
        // move the tree to a suffixed name and drop the scratch.
        let suffixed = unique_sibling(&final_dest);
        let scratch = fresh_scratch_dir(dst_dir)?;
        let moved = TarReader::new(tar_bytes.as_slice())
            .unpack(&scratch)
            .and_then(|_| {
                fs::rename(scratch.join(&root), &suffixed)?;
                Ok(())
            });
        if let Err(e) = fs::remove_dir_all(&scratch) {
            log::warn!("failed to remove scratch directory: {e}");
        }
        moved?;
        Ok(suffixed)
    }

    /// Typed-error form of [`verify`](Self::verify).
    ///
    /// Structural validation only: the payload must decrypt, decompress,
    /// span at least one ustar block, and carry the magic at offset 257.
    /// This is not a cryptographic authentication.
    pub fn try_verify(&self, src_file: &Path) -> Result<()> {
        let tar_bytes = self.read_payload(src_file)?;
        if tar_bytes.len() < BLOCK_SIZE {
            return Err(Error::corrupt_archive(
                0,
                format!("payload too small: {} bytes", tar_bytes.len()),
            ));
        }
        if &tar_bytes[257..262] != b"ustar" {
            return Err(Error::corrupt_archive(257, "ustar magic missing"));
        }
        Ok(())
    }

    /// Reads an artifact and unwraps it down to the ustar byte stream.
    fn read_payload(&self, src_file: &Path) -> Result<Vec<u8>> {
        let raw = fs::read(src_file)?;
        let compressed = match &self.password {
            Some(password) => Encryptor::initialized(password).decrypt(&raw)?,
            None => raw,
        };
        codec::decompress(&compressed)
    }

    /// Resolves the destination policy to a concrete artifact path.
    fn resolve_destination(&self, src_dir: &Path, dst_path: &Path, root: &str) -> Result<PathBuf> {
        let artifact = format!("{root}.bin");

        if dst_path.as_os_str().is_empty() {
            let parent = src_dir.parent().unwrap_or_else(|| Path::new("."));
            return Ok(unique_sibling(&parent.join(artifact)));
        }
        if dst_path.is_dir() {
            return Ok(unique_sibling(&dst_path.join(artifact)));
        }
        if !dst_path.exists() && dst_path.extension().is_none() {
            fs::create_dir_all(dst_path)?;
            return Ok(unique_sibling(&dst_path.join(artifact)));
        }

        if let Some(parent) = dst_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(dst_path.to_path_buf())
    }
}

/// Final path component of the source, or a fixed fallback.
fn root_name(src_dir: &Path) -> String {
    src_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_ROOT.to_string())
}

/// Extracts the leading path component of the first archive entry.
fn peek_root_name(tar_bytes: &[u8]) -> Result<String> {
    if tar_bytes.len() < BLOCK_SIZE {
        return Err(Error::corrupt_archive(0, "payload shorter than one block"));
    }
    let block: &[u8; BLOCK_SIZE] = tar_bytes[..BLOCK_SIZE]
        .try_into()
        .expect("slice is exactly one block");
    let header = TarHeader::parse(block, 0)?;
    let root = header
        .name
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::corrupt_archive(0, "first entry has an empty name"))?;
    Ok(root.to_string())
}

/// Appends `_1`, `_2`, … before the extension until the path is unused.
fn unique_sibling(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let next = parent.join(format!("{stem}_{n}{ext}"));
        if !next.exists() {
            return next;
        }
        n += 1;
    }
}

/// Creates a fresh scratch directory directly under `base`.
fn fresh_scratch_dir(base: &Path) -> Result<PathBuf> {
    let mut n = 0u32;
    loop {
        let candidate = base.join(format!(".restore_{}_{n}", std::process::id()));
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Writes via a `.tmp` sibling and renames into place.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    let written = fs::write(&tmp, data).and_then(|()| fs::rename(&tmp, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written.map_err(Error::Io)
}

fn empty_source(src_dir: &Path, reason: &str) -> Error {
    log::warn!("{reason}: {}", src_dir.display());
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{reason}: {}", src_dir.display()),
    ))
}
