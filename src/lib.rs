//! # dirvault
//!
//! A directory backup engine. A source tree is packed into a single
//! self-describing artifact (a POSIX ustar stream, compressed with Huffman
//! and/or LZSS frames, optionally sealed with password-derived AES-256-CBC)
//! and restored back to a directory tree by the exact inverse pipeline.
//!
//! ## One-shot operation
//!
//! ```rust,no_run
//! use dirvault::{Algorithm, BackupSystem};
//!
//! let mut system = BackupSystem::new();
//! system.set_compression_algorithm(Algorithm::Joined);
//! system.set_password("MySecretPass");
//!
//! assert!(system.backup("/data/projects", "/backups"));
//! assert!(system.verify("/backups/projects.bin"));
//! assert!(system.restore("/backups/projects.bin", "/restore"));
//! ```
//!
//! ## Scheduled operation
//!
//! ```rust,no_run
//! use dirvault::BackupScheduler;
//!
//! let mut scheduler = BackupScheduler::new();
//! // Every hour, keep the newest 24 artifacts.
//! scheduler.add_scheduled_task("/data/projects", "/backups", "hourly", 3600, 24);
//! // On change, keep the newest 10.
//! scheduler.add_realtime_task("/data/notes", "/backups", "notes", 10);
//! scheduler.start();
//! # scheduler.stop();
//! ```
//!
//! ## Artifact format
//!
//! From offset 0: `[optional AES-256-CBC layer][compression layer]`, where
//! the compression layer is either a single frame `[algo][body]` with
//! `algo ∈ {0, 1, 2}` or a parallel container
//! `[0xEE][algo][count:4 LE][{len:4 LE, frame} × count]`, and the
//! decompressed payload is a ustar byte stream. Integrity is structural
//! (CBC padding plus the ustar magic), not cryptographic; see the
//! [`crypto`] module notes.
//!
//! ## Logging
//!
//! Progress and warnings go through the [`log`](https://docs.rs/log) facade;
//! install any logger to see them. No logger is required.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod filter;
pub mod record;
pub mod scheduler;
pub mod system;
pub mod tar;
pub mod traverse;

pub use codec::{Algorithm, CHUNK_SIZE, CONTAINER_MARKER, compress, decompress};
pub use crypto::{Encryptor, Password};
pub use error::{Error, Result};
pub use filter::{Filter, FilterOptions};
pub use record::{FileKind, FileRecord};
pub use scheduler::{BackupScheduler, TaskId, TaskKind};
pub use system::BackupSystem;
pub use tar::{BLOCK_SIZE, TarHeader, TarReader, TarWriter, UnpackResult};
pub use traverse::Traverser;
