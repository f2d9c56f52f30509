//! Bit-level channel over a byte stream.
//!
//! Both halves work most-significant-bit first. The writer packs bits into a
//! pending byte and hands full bytes to the sink; [`BitWriter::finish`] pads
//! the last partial byte with zero bits. The reader pulls one byte at a time
//! from the source and hands its bits out from the top down.
//!
//! ```
//! use midcsv_core::bitio::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new(Vec::new());
//! writer.write_bits(0b101, 3).unwrap();
//! writer.write_bits(0b11, 2).unwrap();
//! let bytes = writer.finish().unwrap();
//! assert_eq!(bytes, vec![0b1011_1000]);
//!
//! let mut reader = BitReader::new(bytes.as_slice());
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(2).unwrap(), 0b11);
//! ```

use std::io::{self, ErrorKind, Read, Write};

use crate::error::{DecodingError, EncodingError, Result};
use crate::huffman::Code;

/// Writes bits MSB-first into a byte sink.
///
/// Call [`finish`](Self::finish) to pad and flush. If the writer is dropped
/// without finishing (for example because an error cut the encode short),
/// the pending bits are still padded and written on a best-effort basis.
pub struct BitWriter<W: Write> {
    /// `None` only once `finish` has handed the sink back.
    sink: Option<W>,
    /// Accumulator for the current partial byte, right-aligned.
    pending: u8,
    /// Bits held in `pending` (0-7).
    pending_len: u8,
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            pending: 0,
            pending_len: 0,
            bits_written: 0,
        }
    }

    /// Append one bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.pending = (self.pending << 1) | bit as u8;
        self.pending_len += 1;
        self.bits_written += 1;
        if self.pending_len == 8 {
            let byte = self.pending;
            self.pending = 0;
            self.pending_len = 0;
            if let Some(sink) = self.sink.as_mut() {
                sink.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    /// Append the low `width` bits of `value`, most significant first.
    ///
    /// # Errors
    /// `EncodingError::FieldOverflow` if `value >= 2^width`.
    pub fn write_bits(&mut self, value: u64, width: u32) -> Result<()> {
        self.write_field("value", value, width)
    }

    /// Like [`write_bits`](Self::write_bits), naming the field in the overflow error.
    pub fn write_field(&mut self, field: &'static str, value: u64, width: u32) -> Result<()> {
        if width > 64 || (width < 64 && value >> width != 0) {
            return Err(EncodingError::FieldOverflow { field, value, width }.into());
        }
        for shift in (0..width).rev() {
            self.write_bit((value >> shift) & 1 == 1)?;
        }
        Ok(())
    }

    /// Append every bit of a Huffman code.
    pub fn write_code(&mut self, code: Code) -> Result<()> {
        for bit in code.bits() {
            self.write_bit(bit)?;
        }
        Ok(())
    }

    /// Bits appended so far, not counting end-of-stream padding.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// Pad to a byte boundary with zero bits, flush, and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush_pending()?;
        // flush_pending leaves the sink in place
        self.sink
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "bit writer already finished").into())
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if self.pending_len > 0 {
            let byte = self.pending << (8 - self.pending_len);
            self.pending = 0;
            self.pending_len = 0;
            sink.write_all(&[byte])?;
        }
        sink.flush()
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush_pending();
    }
}

/// Reads bits MSB-first from a byte source.
///
/// End of input is only an error when a caller asks for a fixed-width field
/// via [`read_bits`](Self::read_bits) or [`next_bit`](Self::next_bit).
pub struct BitReader<R: Read> {
    source: R,
    current: u8,
    /// Unread bits left in `current` (0-8).
    left: u8,
    bits_read: u64,
}

impl<R: Read> BitReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            current: 0,
            left: 0,
            bits_read: 0,
        }
    }

    /// Next bit, or `None` once the source is exhausted.
    pub fn read_bit(&mut self) -> Result<Option<bool>> {
        if self.left == 0 {
            match self.next_byte()? {
                Some(byte) => {
                    self.current = byte;
                    self.left = 8;
                }
                None => return Ok(None),
            }
        }
        self.left -= 1;
        self.bits_read += 1;
        Ok(Some((self.current >> self.left) & 1 == 1))
    }

    /// Next bit, treating end of input as truncation.
    pub fn next_bit(&mut self) -> Result<bool> {
        self.read_bit()?
            .ok_or_else(|| DecodingError::UnexpectedEof { wanted: 1, got: 0 }.into())
    }

    /// Read `width` bits (at most 64) as an unsigned integer, most significant first.
    ///
    /// # Errors
    /// `DecodingError::UnexpectedEof` if the source ends first.
    pub fn read_bits(&mut self, width: u32) -> Result<u64> {
        let mut value = 0u64;
        for got in 0..width {
            match self.read_bit()? {
                Some(bit) => value = (value << 1) | bit as u64,
                None => return Err(DecodingError::UnexpectedEof { wanted: width, got }.into()),
            }
        }
        Ok(value)
    }

    /// Bits consumed so far.
    pub fn bits_read(&self) -> u64 {
        self.bits_read
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
