//! Huffman code tables trained from a value population.
//!
//! A [`HuffmanModel`] is trained once per stream from the complete population
//! of one column (time deltas or packed parameter triples), written into the
//! stream header, and rebuilt from that header on the decode side. The decoder
//! never rebuilds the tree: it accumulates bits and looks the prefix up
//! directly, which works because the code set is prefix-free.
//!
//! # Tree construction
//! Leaves are keyed `(frequency, value)`; interior nodes get fresh ids
//! counting down from -1, so they can never collide with a leaf value. The
//! two lowest keys are merged repeatedly, the first one popped becoming the
//! left child (`0`) and the second the right child (`1`). The ordering is
//! total, so equal populations always produce identical tables.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fmt;
use std::io::{Read, Write};

use log::debug;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{DecodingError, EncodingError, Result};
use crate::format::{CODE_LEN_WIDTH, ENTRY_COUNT_WIDTH, MAX_BITS_WIDTH, MAX_CODE_LEN};

/// A variable-length code of up to 32 bits, stored right-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code {
    bits: u32,
    len: u8,
}

impl Code {
    pub const EMPTY: Code = Code { bits: 0, len: 0 };

    /// Build a code from the low `len` bits of `bits`.
    pub fn new(bits: u32, len: u8) -> Self {
        let mask = if len >= 32 { u32::MAX } else { (1u32 << len) - 1 };
        Self { bits: bits & mask, len }
    }

    /// Parse a string of `'0'`/`'1'` characters.
    pub fn from_bit_str(s: &str) -> Option<Self> {
        if s.len() > 32 {
            return None;
        }
        let mut code = Code::EMPTY;
        for ch in s.chars() {
            code = match ch {
                '0' => code.push(false),
                '1' => code.push(true),
                _ => return None,
            };
        }
        Some(code)
    }

    pub fn len(self) -> usize {
        self.len as usize
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    /// The code bits as an unsigned integer.
    pub fn value(self) -> u32 {
        self.bits
    }

    /// The code extended by one bit.
    pub fn push(self, bit: bool) -> Self {
        Self {
            bits: (self.bits << 1) | bit as u32,
            len: self.len + 1,
        }
    }

    /// Bits from first to last.
    pub fn bits(self) -> impl Iterator<Item = bool> {
        (0..self.len).rev().map(move |i| (self.bits >> i) & 1 == 1)
    }

    /// True when `self` is a proper or improper prefix of `other`.
    pub fn is_prefix_of(self, other: Code) -> bool {
        self.len <= other.len
            && other.bits.checked_shr((other.len - self.len) as u32).unwrap_or(0) == self.bits
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

enum Node {
    Leaf(u32),
    Internal { left: usize, right: usize },
}

/// Queue key: `(frequency, id, arena index)`. Leaves use their value as id.
type Key = (u64, i64, usize);

/// Node arena plus the interior-id counter for a single training run.
struct TreeBuilder {
    nodes: Vec<Node>,
    next_id: i64,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            next_id: -1,
        }
    }

    fn leaf(&mut self, value: u32, freq: u64) -> Key {
        self.nodes.push(Node::Leaf(value));
        (freq, value as i64, self.nodes.len() - 1)
    }

    fn combine(&mut self, left: Key, right: Key) -> Key {
        self.nodes.push(Node::Internal {
            left: left.2,
            right: right.2,
        });
        let id = self.next_id;
        self.next_id -= 1;
        (left.0 + right.0, id, self.nodes.len() - 1)
    }

    /// Assign a code to every leaf below `root`.
    fn assign_codes(&self, root: usize) -> std::result::Result<BTreeMap<u32, Code>, EncodingError> {
        let mut encodings = BTreeMap::new();
        let mut stack = vec![(root, Code::EMPTY)];
        while let Some((idx, code)) = stack.pop() {
            match self.nodes[idx] {
                // a lone leaf still needs one bit
                Node::Leaf(value) if code.is_empty() => {
                    encodings.insert(value, Code::new(0, 1));
                }
                Node::Leaf(value) => {
                    encodings.insert(value, code);
                }
                Node::Internal { left, right } => {
                    if code.len() >= MAX_CODE_LEN {
                        return Err(EncodingError::CodeTooLong {
                            length: code.len() + 1,
                            max: MAX_CODE_LEN,
                        });
                    }
                    stack.push((left, code.push(false)));
                    stack.push((right, code.push(true)));
                }
            }
        }
        Ok(encodings)
    }
}

/// A trained or deserialized Huffman code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanModel {
    /// Width of each value key in the serialized table.
    max_bits: u32,
    encodings: BTreeMap<u32, Code>,
    decodings: HashMap<Code, u32>,
    /// Length of the longest code; bounds the greedy decode loop.
    longest: usize,
}

impl HuffmanModel {
    /// Train a model from a population. Negative entries mean "not applicable"
    /// and are skipped.
    ///
    /// # Errors
    /// `EncodingError::FieldOverflow` for values beyond `u32`,
    /// `EncodingError::CodeTooLong` if the tree grows deeper than the code
    /// length field allows.
    pub fn train<I>(population: I) -> std::result::Result<Self, EncodingError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut freqs: BTreeMap<u32, u64> = BTreeMap::new();
        for value in population {
            if value < 0 {
                continue;
            }
            let value = u32::try_from(value).map_err(|_| EncodingError::FieldOverflow {
                field: "trained value",
                value: value as u64,
                width: u32::BITS,
            })?;
            *freqs.entry(value).or_default() += 1;
        }

        let max = freqs.keys().next_back().copied().unwrap_or(0);
        let max_bits = u32::BITS - max.leading_zeros();

        let mut builder = TreeBuilder::new();
        let mut queue: BinaryHeap<Reverse<Key>> = freqs
            .iter()
            .map(|(&value, &freq)| Reverse(builder.leaf(value, freq)))
            .collect();

        while queue.len() > 1 {
            let (Some(Reverse(a)), Some(Reverse(b))) = (queue.pop(), queue.pop()) else {
                break;
            };
            queue.push(Reverse(builder.combine(a, b)));
        }

        let encodings = match queue.pop() {
            Some(Reverse((_, _, root))) => builder.assign_codes(root)?,
            None => BTreeMap::new(),
        };
        Ok(Self::from_encodings(max_bits, encodings))
    }

    fn from_encodings(max_bits: u32, encodings: BTreeMap<u32, Code>) -> Self {
        let decodings = encodings.iter().map(|(&value, &code)| (code, value)).collect();
        let longest = encodings.values().map(|c| c.len()).max().unwrap_or(0);
        Self {
            max_bits,
            encodings,
            decodings,
            longest,
        }
    }

    /// Bits used for each value key in the serialized table.
    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    /// Number of distinct trained values.
    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    pub fn longest_code(&self) -> usize {
        self.longest
    }

    /// Code assigned to exactly `value`, without fallback.
    pub fn code_for(&self, value: u32) -> Option<Code> {
        self.encodings.get(&value).copied()
    }

    /// `(value, code)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Code)> + '_ {
        self.encodings.iter().map(|(&value, &code)| (value, code))
    }

    /// Code for `value`, falling back to the code for 0 when `value` was
    /// never trained (including negative values).
    pub fn encode(&self, value: i64) -> std::result::Result<Code, EncodingError> {
        u32::try_from(value)
            .ok()
            .and_then(|v| self.encodings.get(&v))
            .or_else(|| self.encodings.get(&0))
            .copied()
            .ok_or(EncodingError::Untrained(value))
    }

    /// Value whose code equals the bits accumulated so far, or `None` if
    /// more bits are needed.
    ///
    /// # Errors
    /// `DecodingError::NoMatchingCode` once `bits_so_far` is longer than any
    /// code in the table.
    pub fn decode(&self, bits_so_far: Code) -> std::result::Result<Option<u32>, DecodingError> {
        if bits_so_far.len() > self.longest {
            return Err(DecodingError::NoMatchingCode {
                model: "huffman",
                bits: bits_so_far.len(),
            });
        }
        Ok(self.decodings.get(&bits_so_far).copied())
    }

    /// Read bits one at a time until they form a known code.
    pub fn read_symbol<R: Read>(&self, reader: &mut BitReader<R>, model: &'static str) -> Result<u32> {
        let mut code = Code::EMPTY;
        loop {
            code = code.push(reader.next_bit()?);
            match self.decode(code) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(_) => {
                    return Err(DecodingError::NoMatchingCode {
                        model,
                        bits: code.len(),
                    }
                    .into())
                }
            }
        }
    }

    /// Serialize the table: `maxBits:5 count:8 (key:maxBits len:5 code:len)*`.
    pub fn write_to<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        let before = writer.bits_written();
        writer.write_field("max bits", self.max_bits as u64, MAX_BITS_WIDTH)?;
        writer.write_field("code table size", self.encodings.len() as u64, ENTRY_COUNT_WIDTH)?;
        for (&value, &code) in &self.encodings {
            writer.write_field("code table key", value as u64, self.max_bits)?;
            writer.write_field("code length", code.len() as u64, CODE_LEN_WIDTH)?;
            writer.write_code(code)?;
        }
        debug!(
            "code table: {} entries, {} key bits, longest code {}, {} bits serialized",
            self.encodings.len(),
            self.max_bits,
            self.longest,
            writer.bits_written() - before
        );
        Ok(())
    }

    /// Rebuild a table written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(reader: &mut BitReader<R>) -> Result<Self> {
        let max_bits = reader.read_bits(MAX_BITS_WIDTH)? as u32;
        let count = reader.read_bits(ENTRY_COUNT_WIDTH)?;
        let mut encodings = BTreeMap::new();
        let mut seen = HashMap::new();
        for _ in 0..count {
            let value = reader.read_bits(max_bits)? as u32;
            let len = reader.read_bits(CODE_LEN_WIDTH)? as u8;
            if len == 0 {
                return Err(DecodingError::InvalidTable(format!("empty code for value {value}")).into());
            }
            let code = Code::new(reader.read_bits(len as u32)? as u32, len);
            if encodings.insert(value, code).is_some() {
                return Err(DecodingError::InvalidTable(format!("value {value} listed twice")).into());
            }
            if let Some(other) = seen.insert(code, value) {
                return Err(DecodingError::InvalidTable(format!(
                    "code {code} shared by values {other} and {value}"
                ))
                .into());
            }
        }
        debug!("read code table: {} entries, {} key bits", encodings.len(), max_bits);
        Ok(Self::from_encodings(max_bits, encodings))
    }
}
