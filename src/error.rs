//! Error types for backup operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes of the backup pipeline, along with a convenient
//! [`Result<T>`] type alias.
//!
//! All fallible operations inside the crate return `Result<T, Error>`. The
//! public [`BackupSystem`] surface catches these at the operation boundary,
//! logs them, and reports a plain `bool`; callers that need the typed error
//! use the lower-level component APIs directly.
//!
//! # Error Categories
//!
//! | Category | Variants | Typical cause |
//! |----------|----------|---------------|
//! | I/O | [`Io`][Error::Io] | File system operations |
//! | Archive | [`CorruptArchive`][Error::CorruptArchive], [`UnsafePath`][Error::UnsafePath] | Damaged or hostile ustar data |
//! | Compression | [`CorruptFrame`][Error::CorruptFrame], [`UnknownAlgorithm`][Error::UnknownAlgorithm] | Damaged frame data |
//! | Encryption | [`Decryption`][Error::Decryption], [`NotInitialized`][Error::NotInitialized] | Wrong password or tampering |
//! | Filtering | [`InvalidFilterPattern`][Error::InvalidFilterPattern] | Malformed user regex |
//!
//! [`BackupSystem`]: crate::BackupSystem

use std::io;

/// The main error type for backup operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    ///
    /// Wraps [`std::io::Error`]; check the underlying
    /// [`std::io::ErrorKind`] for specific handling.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A ustar header failed checksum verification or the stream ended
    /// mid-entry.
    ///
    /// The offset is the byte position of the offending 512-byte block
    /// within the archive stream.
    #[error("corrupt archive at offset {offset:#x}: {reason}")]
    CorruptArchive {
        /// Byte offset of the block where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        reason: String,
    },

    /// An archive entry contained a `..` segment or an absolute component.
    ///
    /// This is a **security error**: such paths could escape the extraction
    /// directory. During unpacking the entry is skipped (stream alignment is
    /// preserved) and a warning is logged rather than aborting the whole
    /// restore.
    #[error("unsafe path in entry {entry_index}: {path}")]
    UnsafePath {
        /// Index of the entry within the archive.
        entry_index: usize,
        /// The offending path as stored in the header.
        path: String,
    },

    /// A compressed frame is truncated or internally inconsistent.
    ///
    /// Raised for a Huffman header shorter than its fixed size, a truncated
    /// Huffman payload, or an LZSS back-reference with an invalid offset.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// The leading algorithm byte of a frame is not a known code.
    ///
    /// Valid codes are 0 (Huffman), 1 (LZSS), 2 (Joined) and the container
    /// marker `0xEE`.
    #[error("unknown compression algorithm byte {code:#04x}")]
    UnknownAlgorithm {
        /// The unrecognized leading byte.
        code: u8,
    },

    /// Decryption failed.
    ///
    /// Either the ciphertext length is not a multiple of the AES block size,
    /// or PKCS#7 padding validation failed at finalization. The latter
    /// almost always means a wrong password or a tampered artifact.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encrypt or decrypt was invoked before a key was derived.
    #[error("cipher used before initialization")]
    NotInitialized,

    /// A user-supplied filter regex failed to compile.
    ///
    /// The filter recovers by dropping the name predicate; this variant is
    /// surfaced through logs and through [`FilterOptions::validate`].
    ///
    /// [`FilterOptions::validate`]: crate::filter::FilterOptions::validate
    #[error("invalid filter pattern '{pattern}': {reason}")]
    InvalidFilterPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// Description from the regex engine.
        reason: String,
    },
}

impl Error {
    /// Returns `true` if this error indicates a security issue.
    pub fn is_security_error(&self) -> bool {
        matches!(self, Error::UnsafePath { .. })
    }

    /// Returns `true` if this is a data corruption error.
    ///
    /// Corruption errors indicate the artifact is damaged: a checksum
    /// mismatch, a truncated stream, or an inconsistent compressed frame.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptArchive { .. } | Error::CorruptFrame(_) | Error::UnknownAlgorithm { .. }
        )
    }

    /// Returns `true` if this is an encryption-related error.
    ///
    /// For an artifact that is actually encrypted, [`Decryption`][Error::Decryption]
    /// usually means the supplied password was wrong.
    pub fn is_encryption_error(&self) -> bool {
        matches!(self, Error::Decryption(_) | Error::NotInitialized)
    }

    /// Creates a `CorruptArchive` error.
    pub fn corrupt_archive(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a `CorruptFrame` error.
    pub fn corrupt_frame(reason: impl Into<String>) -> Self {
        Error::CorruptFrame(reason.into())
    }
}

/// A specialized Result type for backup operations.
pub type Result<T> = std::result::Result<T, Error>;
