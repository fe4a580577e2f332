//! Streaming ustar extraction.
//!
//! The reader consumes 512-byte blocks from any [`Read`] source and
//! materializes entries under a destination directory. It is a small state
//! machine: `ExpectHeader` → (`ReadBody` for regular files) → `ExpectHeader`
//! → … → `Terminated` on the first all-zero block (a second zero block is
//! consumed when present).
//!
//! Safety: every header is checksum-verified (mismatch aborts), and entry
//! paths containing `..` segments or absolute components are skipped with a
//! warning while the stream stays block-aligned, so one hostile entry cannot
//! derail the rest of the archive.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::{Error, Result};

use super::header::{BLOCK_SIZE, TarHeader, is_zero_block, typeflag};
use super::padded_len;

/// Reader state, advanced one block at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// The next block is expected to be a header or the end marker.
    ExpectHeader,
    /// Mid-entry: this many body and padding bytes remain to be consumed.
    ReadBody { remaining: u64, padding: u64 },
    /// End marker seen; no further blocks are interpreted.
    Terminated,
}

/// Statistics returned by [`TarReader::unpack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpackResult {
    /// Entries materialized on disk.
    pub entries_restored: usize,
    /// Entries skipped (unsafe paths, unsupported types, device failures).
    pub entries_skipped: usize,
}

/// Streaming ustar unpacker.
#[derive(Debug)]
pub struct TarReader<R: Read> {
    inner: R,
    offset: u64,
    state: ReadState,
}

impl<R: Read> TarReader<R> {
    /// Creates a reader over a ustar byte source.
    pub fn new(source: R) -> Self {
        Self {
            inner: source,
            offset: 0,
            state: ReadState::ExpectHeader,
        }
    }

    /// Unpacks every entry under `dest`, creating it if needed.
    ///
    /// Mode and mtime are restored after each entry is materialized;
    /// directory timestamps are applied after the walk so writing children
    /// does not disturb them. Ownership restore is attempted only when
    /// running privileged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] on a checksum mismatch or a stream
    /// that ends before the zero-block marker, and [`Error::Io`] on
    /// filesystem failures at the destination.
    pub fn unpack(mut self, dest: impl AsRef<Path>) -> Result<UnpackResult> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        let mut result = UnpackResult::default();
        let mut entry_index = 0usize;
        // Directory mode and times are restored last, deepest first, so
        // writing children neither disturbs the mtime nor trips over a
        // read-only mode.
        let mut deferred_dirs: Vec<(PathBuf, u32, i64)> = Vec::new();

        while self.state != ReadState::Terminated {
            let block = match self.read_block()? {
                Some(block) => block,
                None => {
                    return Err(Error::corrupt_archive(
                        self.offset,
                        "stream ended before end-of-archive marker",
                    ));
                }
            };

            if is_zero_block(&block) {
                // End of archive; consume the second zero block if present.
                let _ = self.read_block()?;
                self.state = ReadState::Terminated;
                break;
            }

            let header = TarHeader::parse(&block, self.offset - BLOCK_SIZE as u64)?;
            let body = padded_len(header.size);
            self.state = ReadState::ReadBody {
                remaining: header.size,
                padding: body - header.size,
            };

            if !is_safe_entry_path(&header.name) {
                log::warn!(
                    "{}",
                    Error::UnsafePath {
                        entry_index,
                        path: header.name.clone(),
                    }
                );
                self.skip_body()?;
                result.entries_skipped += 1;
                entry_index += 1;
                continue;
            }

            let target = dest.join(&header.name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            match self.materialize(&header, &target) {
                Ok(true) => {
                    if header.typeflag == typeflag::DIRECTORY {
                        deferred_dirs.push((target.clone(), header.mode, header.mtime));
                    } else {
                        restore_metadata(&target, &header);
                    }
                    result.entries_restored += 1;
                }
                Ok(false) => result.entries_skipped += 1,
                Err(e) => return Err(e),
            }

            entry_index += 1;
        }

        deferred_dirs.sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));
        for (path, mode, mtime) in deferred_dirs {
            if let Err(e) = restore_mode(&path, mode) {
                log::warn!("mode restore failed for {}: {e}", path.display());
            }
            let ft = FileTime::from_unix_time(mtime, 0);
            if let Err(e) = filetime::set_file_times(&path, ft, ft) {
                log::warn!("mtime restore failed for {}: {e}", path.display());
            }
        }

        Ok(result)
    }

    /// Materializes one entry. Returns `Ok(false)` when the entry was
    /// skipped (unsupported type or device-node failure).
    fn materialize(&mut self, header: &TarHeader, target: &Path) -> Result<bool> {
        match header.typeflag {
            typeflag::DIRECTORY => {
                self.skip_body()?;
                fs::create_dir_all(target)?;
                Ok(true)
            }
            typeflag::SYMLINK => {
                self.skip_body()?;
                if header.linkname.is_empty() {
                    log::warn!("symlink entry without target: {}", header.name);
                    return Ok(false);
                }
                remove_existing(target)?;
                symlink(&header.linkname, target)?;
                Ok(true)
            }
            typeflag::CHAR_DEVICE | typeflag::BLOCK_DEVICE => {
                self.skip_body()?;
                if make_device_node(header, target) {
                    Ok(true)
                } else {
                    log::warn!("cannot create device node, skipping: {}", header.name);
                    Ok(false)
                }
            }
            // '0' and the pre-POSIX NUL flag are regular files.
            typeflag::REGULAR | 0 => {
                self.extract_file(header, target)?;
                Ok(true)
            }
            other => {
                log::warn!(
                    "unsupported typeflag {:?} for entry {}, skipping",
                    other as char,
                    header.name
                );
                self.skip_body()?;
                Ok(false)
            }
        }
    }

    fn extract_file(&mut self, header: &TarHeader, target: &Path) -> Result<()> {
        let mut out = File::create(target)?;
        let mut remaining = header.size;
        let mut buf = [0u8; 8192];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            self.inner.read_exact(&mut buf[..want]).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::corrupt_archive(self.offset, "entry body truncated")
                } else {
                    Error::Io(e)
                }
            })?;
            self.offset += want as u64;
            out.write_all(&buf[..want])?;
            remaining -= want as u64;
        }
        out.flush()?;

        if let ReadState::ReadBody { padding, .. } = self.state {
            self.discard(padding)?;
        }
        self.state = ReadState::ExpectHeader;
        Ok(())
    }

    /// Reads one 512-byte block; `None` on clean EOF at a block boundary.
    fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0usize;

        while filled < BLOCK_SIZE {
            let n = self.inner.read(&mut block[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::corrupt_archive(
                    self.offset + filled as u64,
                    "partial block at end of stream",
                ));
            }
            filled += n;
        }

        self.offset += BLOCK_SIZE as u64;
        Ok(Some(block))
    }

    /// Consumes the current entry's remaining body and padding.
    fn skip_body(&mut self) -> Result<()> {
        if let ReadState::ReadBody { remaining, padding } = self.state {
            self.discard(remaining + padding)?;
        }
        self.state = ReadState::ExpectHeader;
        Ok(())
    }

    fn discard(&mut self, count: u64) -> Result<()> {
        let copied = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())?;
        if copied < count {
            return Err(Error::corrupt_archive(
                self.offset + copied,
                "entry body truncated",
            ));
        }
        self.offset += count;
        Ok(())
    }
}

/// Rejects absolute paths and any `..` segment.
fn is_safe_entry_path(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') {
        return false;
    }
    name.split('/').all(|seg| seg != "..")
}

fn remove_existing(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target)?,
        Ok(_) => fs::remove_file(target)?,
        Err(_) => {}
    }
    Ok(())
}

fn restore_mode(target: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777))?;
    Ok(())
}

/// Restores mode, mtime, and (when privileged) ownership for one entry.
fn restore_metadata(target: &Path, header: &TarHeader) {
    let is_symlink = header.typeflag == typeflag::SYMLINK;
    let ft = FileTime::from_unix_time(header.mtime, 0);

    if is_symlink {
        // Mode bits are meaningless on the link itself; restore only the
        // link's own timestamp.
        if let Err(e) = filetime::set_symlink_file_times(target, ft, ft) {
            log::debug!("symlink time restore failed for {}: {e}", target.display());
        }
    } else {
        if let Err(e) = restore_mode(target, header.mode) {
            log::warn!("mode restore failed for {}: {e}", target.display());
        }
        if let Err(e) = filetime::set_file_times(target, ft, ft) {
            log::warn!("mtime restore failed for {}: {e}", target.display());
        }
    }

    // Ownership restore needs privilege; silently skip otherwise.
    if unsafe { libc::geteuid() } == 0 {
        let c_path = std::ffi::CString::new(target.as_os_str().as_bytes())
            .expect("filesystem paths never contain NUL");
        let rc = unsafe { libc::lchown(c_path.as_ptr(), header.uid, header.gid) };
        if rc != 0 {
            log::warn!(
                "ownership restore failed for {}: {}",
                target.display(),
                io::Error::last_os_error()
            );
        }
    }
}

/// Creates a device node; returns false when the OS refuses.
fn make_device_node(header: &TarHeader, target: &Path) -> bool {
    let kind = if header.typeflag == typeflag::CHAR_DEVICE {
        libc::S_IFCHR
    } else {
        libc::S_IFBLK
    };
    let c_path = match std::ffi::CString::new(target.as_os_str().as_bytes()) {
        Ok(p) => p,
        Err(_) => return false,
    };
    let dev = libc::makedev(header.devmajor, header.devminor);
    let rc = unsafe { libc::mknod(c_path.as_ptr(), kind | (header.mode & 0o777), dev) };
    rc == 0
}
