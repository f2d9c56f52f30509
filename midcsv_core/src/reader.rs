use std::io::Read;

use log::info;

use crate::bitio::BitReader;
use crate::error::{DecodingError, Result};
use crate::format::{StreamHeader, CLASS_WIDTH, LITERAL_CHAR_WIDTH, LITERAL_LEN_WIDTH, TRACK_WIDTH};
use crate::record::{unpack_triple, Command, CommandClass, Payload, Record};

/// Running `(track, time)` state shared by the decoder and the encoder's
/// replay check.
///
/// Time restarts at 0 whenever the track id changes, and both fields return
/// to 0 after `End_of_file`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TrackClock {
    track: u8,
    time: u64,
}

impl TrackClock {
    pub(crate) fn enter(&mut self, track: u8) {
        if track != self.track {
            self.track = track;
            self.time = 0;
        }
    }

    pub(crate) fn advance(&mut self, delta: u32) -> u64 {
        self.time += delta as u64;
        self.time
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Sequential decoder for a packed midicsv stream.
///
/// # Open sequence
/// 1. Read the time-delta code table.
/// 2. Read the parameter code table.
/// 3. Read the 12-bit record count.
///
/// Records are then pulled one at a time with [`read_record`] or by
/// iterating; the reader yields exactly `record_count` records and reports a
/// truncated stream as an error instead of ending early.
///
/// [`read_record`]: Reader::read_record
pub struct Reader<R: Read> {
    bits: BitReader<R>,
    header: StreamHeader,
    decoded: usize,
    clock: TrackClock,
}

impl<R: Read> Reader<R> {
    /// Read the stream header from `source`.
    pub fn open(source: R) -> Result<Self> {
        let mut bits = BitReader::new(source);
        let header = StreamHeader::read_from(&mut bits)?;
        info!(
            "stream header: {} records, {} time codes, {} parameter codes",
            header.record_count,
            header.time_model.len(),
            header.param_model.len()
        );
        Ok(Self {
            bits,
            header,
            decoded: 0,
            clock: TrackClock::default(),
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Number of records the header announces.
    pub fn record_count(&self) -> usize {
        self.header.record_count
    }

    /// Bits consumed so far, header included.
    pub fn bits_read(&self) -> u64 {
        self.bits.bits_read()
    }

    /// Decode the next record, or `None` once `record_count` records are out.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if self.decoded >= self.header.record_count {
            return Ok(None);
        }
        let index = self.decoded;

        let track = self.bits.read_bits(TRACK_WIDTH)? as u8;
        self.clock.enter(track);
        let delta = self.header.time_model.read_symbol(&mut self.bits, "time delta")?;
        let time = u32::try_from(self.clock.advance(delta))
            .map_err(|_| DecodingError::TimeOverflow { index })?;

        let prefix = self.bits.read_bits(CLASS_WIDTH)? as u8;
        let class = CommandClass::from_prefix(prefix)
            .ok_or_else(|| DecodingError::UnknownCommand(format!("class prefix {prefix:02b}")))?;

        let record = match class {
            CommandClass::Literal => {
                let len = self.bits.read_bits(LITERAL_LEN_WIDTH)? as usize;
                let mut literal = String::with_capacity(len);
                for _ in 0..len {
                    literal.push(self.bits.read_bits(LITERAL_CHAR_WIDTH)? as u8 as char);
                }
                let command = Command::from_literal(&literal)
                    .ok_or_else(|| DecodingError::UnknownCommand(literal.clone()))?;
                Record::from_parts(track, time, command, Payload::Literal(literal))
            }
            class => {
                let command = Command::for_class(class)
                    .ok_or_else(|| DecodingError::UnknownCommand(format!("class prefix {prefix:02b}")))?;
                let packed = self.header.param_model.read_symbol(&mut self.bits, "parameter")?;
                Record::from_parts(track, time, command, Payload::Triple(unpack_triple(packed)))
            }
        };

        if record.command() == Command::EndOfFile {
            self.clock.reset();
        }
        self.decoded += 1;
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.read_record().transpose();
        if matches!(item, Some(Err(_))) {
            // nothing after a corrupt record can be trusted
            self.decoded = self.header.record_count;
        }
        item
    }
}

/// Decode a whole stream into records.
pub fn decode<R: Read>(source: R) -> Result<Vec<Record>> {
    let reader = Reader::open(source)?;
    let records = reader.collect::<Result<Vec<_>>>()?;
    info!("decoded {} records", records.len());
    Ok(records)
}
