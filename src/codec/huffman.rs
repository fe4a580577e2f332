//! Huffman entropy coder.
//!
//! Frame body layout:
//!
//! ```text
//! [256 x u64 LE frequency table][u64 LE original size][packed bitstream]
//! ```
//!
//! Codewords are emitted MSB-first within each byte; the tail byte is padded
//! with zero bits. Because the original length is recorded explicitly, the
//! decoder never misreads padding as data.
//!
//! The tree lives in an arena of nodes addressed by index, freed as one
//! allocation. The decoder rebuilds the identical tree from the frequency
//! table, so the heap tie-breaking rule (frequency, then insertion order)
//! must stay deterministic: both sides run the same construction.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::{Error, Result};

/// Fixed header size: 256 frequencies plus the original length.
const HEADER_SIZE: usize = 256 * 8 + 8;

/// Arena index of a tree node.
type NodeId = usize;

struct Node {
    symbol: u8,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Huffman tree in an index-addressed arena.
struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    /// Builds the tree from a frequency table.
    ///
    /// Returns a tree with no root when every frequency is zero. A single
    /// distinct symbol produces the degenerate shape: the lone leaf hangs as
    /// the root's left child, so its codeword is "0".
    fn from_frequencies(freqs: &[u64; 256]) -> Self {
        let mut nodes = Vec::new();
        // Min-heap keyed by (frequency, insertion sequence); the sequence
        // makes ties deterministic across encode and decode.
        let mut heap: BinaryHeap<Reverse<(u64, usize, NodeId)>> = BinaryHeap::new();
        let mut seq = 0usize;

        for (symbol, &freq) in freqs.iter().enumerate() {
            if freq > 0 {
                let id = nodes.len();
                nodes.push(Node {
                    symbol: symbol as u8,
                    left: None,
                    right: None,
                });
                heap.push(Reverse((freq, seq, id)));
                seq += 1;
            }
        }

        if heap.is_empty() {
            return Self { nodes, root: None };
        }

        if heap.len() == 1 {
            let Reverse((_, _, leaf)) = heap.pop().expect("heap has one element");
            let root = nodes.len();
            nodes.push(Node {
                symbol: 0,
                left: Some(leaf),
                right: None,
            });
            return Self {
                nodes,
                root: Some(root),
            };
        }

        while heap.len() > 1 {
            let Reverse((fa, _, a)) = heap.pop().expect("len > 1");
            let Reverse((fb, _, b)) = heap.pop().expect("len > 1");
            let id = nodes.len();
            nodes.push(Node {
                symbol: 0,
                left: Some(a),
                right: Some(b),
            });
            heap.push(Reverse((fa + fb, seq, id)));
            seq += 1;
        }

        let Reverse((_, _, root)) = heap.pop().expect("one element remains");
        Self {
            nodes,
            root: Some(root),
        }
    }

    /// Assigns codewords: 0 to left edges, 1 to right edges.
    fn codes(&self) -> [Option<Vec<bool>>; 256] {
        let mut table: [Option<Vec<bool>>; 256] = [const { None }; 256];
        if let Some(root) = self.root {
            let mut stack: Vec<(NodeId, Vec<bool>)> = vec![(root, Vec::new())];
            while let Some((id, path)) = stack.pop() {
                let node = &self.nodes[id];
                if node.is_leaf() {
                    table[node.symbol as usize] = Some(path);
                    continue;
                }
                if let Some(right) = node.right {
                    let mut p = path.clone();
                    p.push(true);
                    stack.push((right, p));
                }
                if let Some(left) = node.left {
                    let mut p = path;
                    p.push(false);
                    stack.push((left, p));
                }
            }
        }
        table
    }
}

/// Encodes `input` into a Huffman frame body.
pub(crate) fn encode(input: &[u8]) -> Vec<u8> {
    let mut freqs = [0u64; 256];
    for &byte in input {
        freqs[byte as usize] += 1;
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + input.len() / 2);
    for freq in freqs {
        out.extend_from_slice(&freq.to_le_bytes());
    }
    out.extend_from_slice(&(input.len() as u64).to_le_bytes());

    if input.is_empty() {
        return out;
    }

    let tree = Tree::from_frequencies(&freqs);
    let codes = tree.codes();

    let mut writer = BitWriter::new(&mut out);
    for &byte in input {
        let code = codes[byte as usize]
            .as_ref()
            .expect("every input byte has a nonzero frequency");
        for &bit in code {
            writer.push(bit);
        }
    }
    writer.finish();

    out
}

/// Decodes a Huffman frame body.
///
/// # Errors
///
/// Returns [`Error::CorruptFrame`] when the header is shorter than its fixed
/// size, the frequency table is inconsistent, or the bitstream ends before
/// the recorded original length is reached.
pub(crate) fn decode(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() < HEADER_SIZE {
        return Err(Error::corrupt_frame(format!(
            "Huffman header too small: {} < {HEADER_SIZE}",
            body.len()
        )));
    }

    let mut freqs = [0u64; 256];
    for (i, freq) in freqs.iter_mut().enumerate() {
        let at = i * 8;
        *freq = u64::from_le_bytes(body[at..at + 8].try_into().expect("8-byte slice"));
    }
    let original_size = u64::from_le_bytes(
        body[256 * 8..HEADER_SIZE]
            .try_into()
            .expect("8-byte slice"),
    ) as usize;

    if original_size == 0 {
        return Ok(Vec::new());
    }

    // Every output byte consumes at least one bit, so a recorded length
    // beyond the available bit count is a truncated or forged frame. This
    // also bounds the output allocation for garbage input.
    let available_bits = (body.len() - HEADER_SIZE) * 8;
    if original_size > available_bits {
        return Err(Error::corrupt_frame(format!(
            "recorded length {original_size} exceeds {available_bits} available bits"
        )));
    }

    let tree = Tree::from_frequencies(&freqs);
    let root = tree
        .root
        .ok_or_else(|| Error::corrupt_frame("nonzero length with empty frequency table"))?;

    let mut out = Vec::with_capacity(original_size);
    let mut reader = BitReader::new(&body[HEADER_SIZE..]);
    let mut cursor = root;

    while out.len() < original_size {
        let bit = reader
            .next()
            .ok_or_else(|| Error::corrupt_frame("truncated Huffman payload"))?;
        let node = &tree.nodes[cursor];
        cursor = if bit { node.right } else { node.left }
            .ok_or_else(|| Error::corrupt_frame("invalid codeword path"))?;

        if tree.nodes[cursor].is_leaf() {
            out.push(tree.nodes[cursor].symbol);
            cursor = root;
        }
    }

    Ok(out)
}

/// Packs bits MSB-first into the output vector.
struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    buffer: u8,
    count: u8,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            buffer: 0,
            count: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        if bit {
            self.buffer |= 1 << (7 - self.count);
        }
        self.count += 1;
        if self.count == 8 {
            self.out.push(self.buffer);
            self.buffer = 0;
            self.count = 0;
        }
    }

    fn finish(self) {
        if self.count > 0 {
            self.out.push(self.buffer);
        }
    }
}

/// Reads bits MSB-first from a slice.
struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    fn next(&mut self) -> Option<bool> {
        let byte = *self.data.get(self.byte)?;
        let bit = (byte >> (7 - self.bit)) & 1 == 1;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
        Some(bit)
    }
}
