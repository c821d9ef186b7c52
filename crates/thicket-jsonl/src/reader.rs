//! JSONL reading operations.
//!
//! This module provides buffered, line-by-line reading of JSONL data with
//! line number tracking for error reporting.

use std::io::{BufRead, BufReader, Read};

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Buffered reader for JSONL (JSON Lines) data.
///
/// `JsonlReader` wraps a reader in a [`BufReader`] and tracks line numbers so
/// decode failures can point at the offending line. Blank lines (empty or
/// whitespace-only) are skipped but still counted.
///
/// # Examples
///
/// ```
/// use thicket_jsonl::JsonlReader;
///
/// let data = b"{\"id\":1}\n\n{\"id\":2}\n";
/// let mut reader = JsonlReader::new(&data[..]);
///
/// let first: serde_json::Value = reader.read_line().unwrap().unwrap();
/// assert_eq!(first["id"], 1);
/// assert_eq!(reader.line_number(), 1);
///
/// let second: serde_json::Value = reader.read_line().unwrap().unwrap();
/// assert_eq!(second["id"], 2);
/// assert_eq!(reader.line_number(), 3);
/// ```
pub struct JsonlReader<R> {
    /// Buffered reader wrapping the underlying reader.
    reader: BufReader<R>,
    /// 1-based number of the last physical line read; 0 before any reads.
    line_number: usize,
    /// Reused line buffer; bytes so invalid UTF-8 can be reported by line.
    buf: Vec<u8>,
}

impl<R: Read> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Returns the current line number.
    ///
    /// Returns 0 before any lines have been read. After reading, returns the
    /// 1-based line number of the last line read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next non-blank line, without its line terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying reader fails, or
    /// [`Error::InvalidUtf8`] with the line number if the line is not UTF-8.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            if self.buf.trim_ascii().is_empty() {
                continue;
            }

            let mut len = self.buf.len();
            while len > 0 && matches!(self.buf[len - 1], b'\n' | b'\r') {
                len -= 1;
            }
            return std::str::from_utf8(&self.buf[..len])
                .map(Some)
                .map_err(|source| Error::InvalidUtf8 {
                    line_number: self.line_number,
                    source,
                });
        }
    }

    /// Reads and deserializes the next non-blank line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] with the line number if the line is not a valid
    /// `T`, or [`Error::Io`] on read failure.
    pub fn read_line<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.read_line_with(|line| serde_json::from_str(line))
    }

    /// Reads the next non-blank line and decodes it with `decode`.
    ///
    /// This is the hook for formats that need to inspect a line before picking
    /// a concrete type.
    ///
    /// # Errors
    ///
    /// Decode failures are wrapped in [`Error::Parse`] carrying the line number.
    pub fn read_line_with<T, F>(&mut self, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(&str) -> serde_json::Result<T>,
    {
        let decoded = match self.next_line()? {
            Some(line) => decode(line),
            None => return Ok(None),
        };

        decoded.map(Some).map_err(|source| Error::Parse {
            line_number: self.line_number,
            source,
        })
    }

    /// Reads every remaining line, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`read_line`](Self::read_line).
    pub fn read_all<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        while let Some(value) = self.read_line()? {
            values.push(value);
        }
        Ok(values)
    }
}
