//! Packing file records into a ustar stream.

use std::fs::File;
use std::io::{Read, Write};

use crate::Result;
use crate::record::FileRecord;

use super::header::{BLOCK_SIZE, encode_header};

/// Serializes [`FileRecord`]s into a ustar byte stream.
///
/// Records are written in the order they are appended; [`finish`] terminates
/// the archive with two zero blocks and returns the sink. The sink is any
/// [`Write`] implementation, so archives can be built directly in memory:
///
/// ```rust,ignore
/// let mut writer = TarWriter::new(Vec::new());
/// for record in &records {
///     writer.append(record)?;
/// }
/// let archive: Vec<u8> = writer.finish()?;
/// ```
///
/// [`finish`]: TarWriter::finish
#[derive(Debug)]
pub struct TarWriter<W: Write> {
    inner: W,
}

impl<W: Write> TarWriter<W> {
    /// Creates a writer over the given sink.
    pub fn new(sink: W) -> Self {
        Self { inner: sink }
    }

    /// Appends one record: header block, then for regular files the body
    /// padded to a 512-byte boundary.
    ///
    /// Directories, symlinks, and device entries are header-only; the
    /// symlink target and device numbers travel inside the header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when the source file cannot
    /// be opened or read, or the sink cannot be written.
    pub fn append(&mut self, record: &FileRecord) -> Result<()> {
        let header = encode_header(record);
        self.inner.write_all(&header)?;

        if record.is_regular() {
            self.write_body(record)?;
        }
        Ok(())
    }

    /// Packs a whole record sequence and terminates the archive.
    pub fn pack(mut self, records: &[FileRecord]) -> Result<W> {
        for record in records {
            self.append(record)?;
        }
        self.finish()
    }

    /// Writes the end-of-archive marker (two zero blocks) and returns the
    /// sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&[0u8; BLOCK_SIZE * 2])?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_body(&mut self, record: &FileRecord) -> Result<()> {
        let mut file = File::open(&record.absolute_path)?;
        let mut remaining = record.size;
        let mut buf = [0u8; 8192];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = file.read(&mut buf[..want])?;
            if n == 0 {
                // File shrank between stat and read; the header already
                // promised `size` bytes, so fill the gap with zeroes.
                log::warn!(
                    "file truncated while packing, zero-filling {} bytes: {}",
                    remaining,
                    record.absolute_path.display()
                );
                self.write_zeroes(remaining)?;
                break;
            }
            self.inner.write_all(&buf[..n])?;
            remaining -= n as u64;
        }

        let padding = (BLOCK_SIZE as u64 - (record.size % BLOCK_SIZE as u64)) % BLOCK_SIZE as u64;
        self.write_zeroes(padding)
    }

    fn write_zeroes(&mut self, mut count: u64) -> Result<()> {
        let zeroes = [0u8; BLOCK_SIZE];
        while count > 0 {
            let n = count.min(BLOCK_SIZE as u64) as usize;
            self.inner.write_all(&zeroes[..n])?;
            count -= n as u64;
        }
        Ok(())
    }
}
