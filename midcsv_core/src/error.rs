//! Error types for parsing, packing, and unpacking midicsv streams.
//!
//! Every failure is fatal for the current call: a bad line invalidates the
//! delta bookkeeping for everything after it, and a corrupt stream has no
//! resynchronization point.

use thiserror::Error;

/// Top-level error type returned by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// A text line could not be turned into a record.
    #[error("line {line}: {source}")]
    Parse {
        /// 1-based line number in the text input.
        line: usize,
        source: ParseError,
    },

    /// A value does not fit the stream format.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The stream is truncated or corrupt.
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    /// The underlying byte source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A text line that does not have the shape of a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// Parameterized commands carry exactly three byte parameters.
    #[error("{command} takes 3 parameters, found {found}")]
    WrongParameterCount { command: &'static str, found: usize },

    /// A literal payload was given to a parameterized command or vice versa.
    #[error("payload does not match the shape of {command}")]
    PayloadMismatch { command: &'static str },
}

/// A value that the stream format cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("{field} value {value} does not fit in {width} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: u32,
    },

    #[error("literal {0:?} contains a non-ASCII character")]
    NonAsciiLiteral(String),

    #[error("huffman code of length {length} exceeds the {max}-bit limit")]
    CodeTooLong { length: usize, max: usize },

    /// The value was never trained and the model has no code for 0 to fall back on.
    #[error("value {0} has no code and the model has no fallback code for 0")]
    Untrained(i64),

    /// The decoder's running-time state machine would not rebuild this time.
    #[error("record {index}: time {time} would decode as {decoded}")]
    UnreproducibleTime { index: usize, time: u32, decoded: u64 },
}

/// A stream that ends early or contains bits no model recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    #[error("unexpected end of stream: wanted {wanted} bits, got {got}")]
    UnexpectedEof { wanted: u32, got: u32 },

    #[error("no {model} code matches after {bits} bits")]
    NoMatchingCode { model: &'static str, bits: usize },

    #[error("invalid code table: {0}")]
    InvalidTable(String),

    #[error("literal {0:?} does not name a literal-class command")]
    UnknownCommand(String),

    #[error("running time overflowed at record {index}")]
    TimeOverflow { index: usize },
}

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
