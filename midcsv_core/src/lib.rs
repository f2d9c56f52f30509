//! Lossless bit-packed codec for midicsv event logs.
//!
//! A midicsv dump has very few distinct command/parameter combinations and a
//! time column whose successive differences cluster around a handful of
//! values. The stream exploits both: time is delta-coded, one Huffman table
//! covers the deltas and another the 24-bit parameter triples of
//! `Control_c`/`Note_on_c`/`Note_off_c`, and every other command is kept as
//! 7-bit literal text.
//!
//! ```
//! use midcsv_core::{decode, encode, Record};
//!
//! let records: Vec<Record> = ["0, 0, Header, 1, 1, 480", "0, 0, Note_on_c, 0, 60, 100"]
//!     .iter()
//!     .map(|line| line.parse().unwrap())
//!     .collect();
//!
//! let mut packed = Vec::new();
//! encode(&records, &mut packed).unwrap();
//! assert_eq!(decode(packed.as_slice()).unwrap(), records);
//! ```

pub mod bitio;
pub mod error;
pub mod format;
pub mod huffman;
pub mod reader;
pub mod record;
pub mod text;
pub mod writer;

pub use error::{DecodingError, EncodingError, Error, ParseError, Result};
pub use format::StreamHeader;
pub use huffman::{Code, HuffmanModel};
pub use reader::{decode, Reader};
pub use record::{Command, CommandClass, Payload, Record};
pub use text::{read_records, write_records};
pub use writer::{encode, Writer};
