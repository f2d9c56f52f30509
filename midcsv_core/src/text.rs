//! midicsv text in and out.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::record::Record;

/// Parse every non-blank line of `input`.
///
/// Stops at the first bad line; its 1-based number is reported in
/// [`Error::Parse`].
pub fn read_records<R: BufRead>(input: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.trim().is_empty() {
            continue;
        }
        let record = line
            .parse()
            .map_err(|source| Error::Parse { line: idx + 1, source })?;
        records.push(record);
    }
    Ok(records)
}

/// Write one line per record.
pub fn write_records<W: Write>(mut out: W, records: &[Record]) -> Result<()> {
    for record in records {
        writeln!(out, "{record}")?;
    }
    out.flush()?;
    Ok(())
}
