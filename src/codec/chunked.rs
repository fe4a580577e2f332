//! Parallel chunk container.
//!
//! Large inputs are split into contiguous chunks compressed independently,
//! so chunk work fans out across cores. Container layout:
//!
//! ```text
//! [0xEE][algo:1][count:4 LE][{len:4 LE, frame} x count]
//! ```
//!
//! Every chunk is a complete algorithm frame carrying its own algorithm
//! byte, so each one round-trips independently of the container. Chunks may
//! be processed in any order; concatenation order is fixed by the index.

use rayon::prelude::*;

use crate::{Error, Result};

use super::{Algorithm, CONTAINER_MARKER, decode_frame, encode_frame};

/// Chunk size: 8 MiB. Inputs below twice this skip the container.
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Compresses `input` into a parallel container.
pub(crate) fn compress(input: &[u8], algorithm: Algorithm) -> Vec<u8> {
    let frames: Vec<Vec<u8>> = input
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| encode_frame(chunk, algorithm))
        .collect();

    let total: usize = frames.iter().map(|f| f.len() + 4).sum();
    let mut out = Vec::with_capacity(6 + total);
    out.push(CONTAINER_MARKER);
    out.push(algorithm.code());
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    for frame in &frames {
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(frame);
    }
    out
}

/// Decompresses the container body (everything after the `0xEE` marker).
///
/// # Errors
///
/// Returns [`Error::CorruptFrame`] when the chunk table or a chunk body is
/// truncated, and whatever error the per-chunk frames produce.
pub(crate) fn decompress(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() < 5 {
        return Err(Error::corrupt_frame("container header truncated"));
    }
    // The container-level algorithm byte is descriptive; each chunk frame
    // is self-describing, but an invalid byte here means a damaged stream.
    Algorithm::from_code(body[0])?;
    let count = u32::from_le_bytes(body[1..5].try_into().expect("4-byte slice")) as usize;
    // Each record needs at least its 4-byte length; a count beyond that is
    // a forged header, and this check bounds the table allocation.
    if count > (body.len() - 5) / 4 {
        return Err(Error::corrupt_frame(format!(
            "chunk count {count} impossible for {} container bytes",
            body.len()
        )));
    }

    let mut chunks: Vec<&[u8]> = Vec::with_capacity(count);
    let mut pos = 5usize;
    for index in 0..count {
        if pos + 4 > body.len() {
            return Err(Error::corrupt_frame(format!(
                "chunk table truncated at record {index}"
            )));
        }
        let len = u32::from_le_bytes(body[pos..pos + 4].try_into().expect("4-byte slice")) as usize;
        pos += 4;
        if pos + len > body.len() {
            return Err(Error::corrupt_frame(format!(
                "chunk {index} body truncated ({len} bytes promised)"
            )));
        }
        chunks.push(&body[pos..pos + len]);
        pos += len;
    }

    let decompressed: Vec<Vec<u8>> = chunks
        .par_iter()
        .map(|chunk| decode_frame(chunk))
        .collect::<Result<_>>()?;

    let total: usize = decompressed.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in decompressed {
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}
