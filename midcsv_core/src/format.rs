//! Stream layout and field widths.
//!
//! ```text
//! Stream      := TimeModel ParamModel RecordCount Record*
//! Model       := maxBits:5 count:8 Entry{count}
//! Entry       := key:maxBits codeLen:5 code:codeLen
//! RecordCount := n:12
//! Record      := track:2 timeDeltaCode classPrefix:2 Body
//! Body(00)    := literalLen:6 char:7{literalLen}
//! Body(01-11) := paramCode
//! ```
//!
//! Every fixed-width field is written most significant bit first; the stream
//! is zero-padded to a byte boundary at the end.

use std::io::{Read, Write};

use log::debug;

use crate::bitio::{BitReader, BitWriter};
use crate::error::Result;
use crate::huffman::HuffmanModel;

// ── Code table fields ──────────────────────────────────────────────────────

/// Width of a model's `maxBits` field.
pub const MAX_BITS_WIDTH: u32 = 5;

/// Width of a model's entry count.
pub const ENTRY_COUNT_WIDTH: u32 = 8;

/// Width of each entry's code length.
pub const CODE_LEN_WIDTH: u32 = 5;

/// Most entries a single code table can list.
pub const MAX_ENTRIES: usize = (1 << ENTRY_COUNT_WIDTH) - 1;

/// Longest code the code length field can describe.
pub const MAX_CODE_LEN: usize = (1 << CODE_LEN_WIDTH) - 1;

// ── Record fields ──────────────────────────────────────────────────────────

pub const RECORD_COUNT_WIDTH: u32 = 12;
pub const TRACK_WIDTH: u32 = 2;
pub const CLASS_WIDTH: u32 = 2;
pub const LITERAL_LEN_WIDTH: u32 = 6;
pub const LITERAL_CHAR_WIDTH: u32 = 7;

/// Most records one stream can carry.
pub const MAX_RECORDS: usize = (1 << RECORD_COUNT_WIDTH) - 1;

/// Longest literal tail, in characters.
pub const MAX_LITERAL_LEN: usize = (1 << LITERAL_LEN_WIDTH) - 1;

pub const MAX_TRACK: u8 = (1 << TRACK_WIDTH) - 1;

// ── Header ─────────────────────────────────────────────────────────────────

/// Everything in front of the first record: both code tables and the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Code table over time deltas.
    pub time_model: HuffmanModel,
    /// Code table over packed 24-bit parameter triples.
    pub param_model: HuffmanModel,
    pub record_count: usize,
}

impl StreamHeader {
    pub fn write_to<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        self.time_model.write_to(writer)?;
        self.param_model.write_to(writer)?;
        writer.write_field("record count", self.record_count as u64, RECORD_COUNT_WIDTH)?;
        debug!("header: {} bits", writer.bits_written());
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut BitReader<R>) -> Result<Self> {
        let time_model = HuffmanModel::read_from(reader)?;
        let param_model = HuffmanModel::read_from(reader)?;
        let record_count = reader.read_bits(RECORD_COUNT_WIDTH)? as usize;
        Ok(Self {
            time_model,
            param_model,
            record_count,
        })
    }
}
