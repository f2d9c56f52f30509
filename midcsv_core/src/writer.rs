use std::io::Write;

use log::{debug, info};

use crate::bitio::BitWriter;
use crate::error::{EncodingError, Result};
use crate::format::{StreamHeader, CLASS_WIDTH, LITERAL_CHAR_WIDTH, LITERAL_LEN_WIDTH, TRACK_WIDTH};
use crate::huffman::HuffmanModel;
use crate::reader::TrackClock;
use crate::record::{pack_triple, Command, Payload, Record};

/// Buffering encoder for a packed midicsv stream.
///
/// # Write contract
/// Both code tables are trained from the complete stream, so nothing can be
/// emitted until every record is known. Call [`write`] or [`extend`] as often
/// as needed, then [`finish`] to train the tables and write the stream.
///
/// # Layout written
/// ```text
/// [TIME TABLE] [PARAMETER TABLE] [COUNT:12]
/// [RECORD 0] [RECORD 1] ... [RECORD N-1] [zero padding to a byte]
/// ```
///
/// [`write`]: Writer::write
/// [`extend`]: Writer::extend
/// [`finish`]: Writer::finish
pub struct Writer<W: Write> {
    sink: W,
    records: Vec<Record>,
}

impl<W: Write> Writer<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            records: Vec::new(),
        }
    }

    /// Queue one record.
    pub fn write(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Queue records in order.
    pub fn extend<I: IntoIterator<Item = Record>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Records queued so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Train both tables, write the stream, and pad it to a byte boundary.
    ///
    /// Returns the number of bits written, excluding padding.
    pub fn finish(self) -> Result<u64> {
        encode(&self.records, self.sink)
    }
}

/// `deltas[0] = 0`, `deltas[i] = time[i] - time[i-1]`, across track boundaries.
pub fn time_deltas(records: &[Record]) -> Vec<i64> {
    let mut prev = None;
    records
        .iter()
        .map(|r| {
            let time = r.time() as i64;
            let delta = prev.map_or(0, |p| time - p);
            prev = Some(time);
            delta
        })
        .collect()
}

/// Encode `records` into `sink`. Returns the number of bits written,
/// excluding padding.
///
/// # Errors
/// `EncodingError` when a field overflows its width (more than 4095 records,
/// a track above 3, a literal over 63 characters, more than 255 distinct
/// values in a table), when a literal is not ASCII, or when the decoder
/// could not rebuild a record's time from the delta column.
pub fn encode<W: Write>(records: &[Record], sink: W) -> Result<u64> {
    let deltas = time_deltas(records);
    let header = StreamHeader {
        time_model: HuffmanModel::train(deltas.iter().copied())?,
        param_model: HuffmanModel::train(records.iter().filter_map(Record::packed_params).map(i64::from))?,
        record_count: records.len(),
    };

    debug!(
        "trained {} time codes and {} parameter codes over {} records",
        header.time_model.len(),
        header.param_model.len(),
        records.len()
    );

    let mut bits = BitWriter::new(sink);
    header.write_to(&mut bits)?;

    let mut clock = TrackClock::default();
    for (index, (record, &delta)) in records.iter().zip(&deltas).enumerate() {
        check_time(&mut clock, &header.time_model, index, record, delta)?;
        write_record(&mut bits, &header, record, delta)?;
    }

    let total = bits.bits_written();
    bits.finish()?;
    info!("encoded {} records in {} bits", records.len(), total);
    Ok(total)
}

/// Replay the decoder's clock and make sure it lands on `record.time()`.
///
/// A negative delta is not in the table and goes out as the code for 0, so
/// it only survives when a track change resets the decoder's clock.
fn check_time(
    clock: &mut TrackClock,
    time_model: &HuffmanModel,
    index: usize,
    record: &Record,
    delta: i64,
) -> Result<()> {
    let sent = u32::try_from(delta)
        .ok()
        .filter(|d| time_model.code_for(*d).is_some())
        .unwrap_or(0);
    clock.enter(record.track());
    let decoded = clock.advance(sent);
    if decoded != record.time() as u64 {
        return Err(EncodingError::UnreproducibleTime {
            index,
            time: record.time(),
            decoded,
        }
        .into());
    }
    if record.command() == Command::EndOfFile {
        clock.reset();
    }
    Ok(())
}

fn write_record<W: Write>(
    bits: &mut BitWriter<W>,
    header: &StreamHeader,
    record: &Record,
    delta: i64,
) -> Result<()> {
    bits.write_field("track", record.track() as u64, TRACK_WIDTH)?;
    bits.write_code(header.time_model.encode(delta)?)?;
    bits.write_field("class prefix", record.command().class().prefix() as u64, CLASS_WIDTH)?;
    match record.payload() {
        Payload::Literal(text) => {
            if !text.is_ascii() {
                return Err(EncodingError::NonAsciiLiteral(text.clone()).into());
            }
            bits.write_field("literal length", text.len() as u64, LITERAL_LEN_WIDTH)?;
            for byte in text.bytes() {
                bits.write_field("literal character", byte as u64, LITERAL_CHAR_WIDTH)?;
            }
        }
        Payload::Triple(params) => {
            let packed = pack_triple(*params);
            bits.write_code(header.param_model.encode(packed as i64)?)?;
        }
    }
    Ok(())
}
