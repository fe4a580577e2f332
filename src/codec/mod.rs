//! Compression engine: self-describing frames and the parallel container.
//!
//! [`compress`] tags its output with a leading algorithm byte so
//! [`decompress`] needs no out-of-band information:
//!
//! | Leading byte | Meaning |
//! |---|---|
//! | `0x00` | Huffman frame |
//! | `0x01` | LZSS frame |
//! | `0x02` | Joined frame (Huffman inner, LZSS outer) |
//! | `0xEE` | Parallel chunk container |
//!
//! Inputs of at least twice [`CHUNK_SIZE`] are split into contiguous chunks
//! compressed independently (see the container layout in `chunked`);
//! everything else is a single frame.

mod chunked;
mod huffman;
mod lzss;

use crate::{Error, Result};

pub use chunked::CHUNK_SIZE;

/// Marker byte opening a parallel chunk container.
///
/// Reserved: it must never collide with an [`Algorithm`] code.
pub const CONTAINER_MARKER: u8 = 0xEE;

/// Compression algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Huffman entropy coding.
    Huffman,
    /// LZSS sliding-window coding (the default).
    #[default]
    Lzss,
    /// LZSS over a Huffman frame.
    Joined,
}

impl Algorithm {
    /// Returns the on-disk algorithm byte.
    pub fn code(self) -> u8 {
        match self {
            Algorithm::Huffman => 0,
            Algorithm::Lzss => 1,
            Algorithm::Joined => 2,
        }
    }

    /// Parses an algorithm byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAlgorithm`] for any byte outside {0, 1, 2}.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Algorithm::Huffman),
            1 => Ok(Algorithm::Lzss),
            2 => Ok(Algorithm::Joined),
            _ => Err(Error::UnknownAlgorithm { code }),
        }
    }

    /// Returns a human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Huffman => "Huffman",
            Algorithm::Lzss => "LZSS",
            Algorithm::Joined => "Joined",
        }
    }
}

/// Compresses `input` with the chosen algorithm.
///
/// The output is self-describing: a single algorithm frame, or a parallel
/// container for inputs of at least `2 * CHUNK_SIZE`.
pub fn compress(input: &[u8], algorithm: Algorithm) -> Vec<u8> {
    if input.len() >= 2 * CHUNK_SIZE {
        return chunked::compress(input, algorithm);
    }
    encode_frame(input, algorithm)
}

/// Decompresses a self-describing frame or container.
///
/// # Errors
///
/// Returns [`Error::UnknownAlgorithm`] for an unrecognized leading byte and
/// [`Error::CorruptFrame`] for truncated or inconsistent frame data.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let (&code, body) = input
        .split_first()
        .ok_or_else(|| Error::corrupt_frame("empty input"))?;
    if code == CONTAINER_MARKER {
        return chunked::decompress(body);
    }
    decode_body(Algorithm::from_code(code)?, body)
}

/// Encodes one `[algo][body]` frame.
pub(crate) fn encode_frame(input: &[u8], algorithm: Algorithm) -> Vec<u8> {
    let body = match algorithm {
        Algorithm::Huffman => huffman::encode(input),
        Algorithm::Lzss => lzss::encode(input),
        Algorithm::Joined => lzss::encode(&huffman::encode(input)),
    };
    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.push(algorithm.code());
    frame.extend_from_slice(&body);
    frame
}

/// Decodes one `[algo][body]` frame.
pub(crate) fn decode_frame(frame: &[u8]) -> Result<Vec<u8>> {
    let (&code, body) = frame
        .split_first()
        .ok_or_else(|| Error::corrupt_frame("empty chunk frame"))?;
    decode_body(Algorithm::from_code(code)?, body)
}

fn decode_body(algorithm: Algorithm, body: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        Algorithm::Huffman => huffman::decode(body),
        Algorithm::Lzss => lzss::decode(body),
        Algorithm::Joined => huffman::decode(&lzss::decode(body)?),
    }
}
