//! JSONL writing operations.
//!
//! This module provides buffered writing of data in JSONL format.

use std::io::{BufWriter, Write};

use serde::Serialize;

use crate::Result;

/// Buffered writer for JSONL (JSON Lines) data.
///
/// Each value is serialized to a single compact JSON line followed by `\n`.
/// `serde_json` escapes embedded newlines inside strings, so one value always
/// occupies exactly one line.
///
/// # Examples
///
/// ```
/// use thicket_jsonl::JsonlWriter;
///
/// let mut writer = JsonlWriter::new(Vec::new());
/// writer.write(&serde_json::json!({"id": 1})).unwrap();
/// writer.write(&serde_json::json!({"id": 2})).unwrap();
///
/// let bytes = writer.into_inner().unwrap();
/// assert_eq!(bytes, b"{\"id\":1}\n{\"id\":2}\n");
/// ```
pub struct JsonlWriter<W: Write> {
    /// Buffered writer wrapping the underlying writer.
    writer: BufWriter<W>,
    /// Number of lines written so far.
    lines_written: usize,
}

impl<W: Write> JsonlWriter<W> {
    /// Creates a new `JsonlWriter` wrapping the given writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            lines_written: 0,
        }
    }

    /// Serializes `value` as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.lines_written += 1;
        Ok(())
    }

    /// Serializes every value in `values`, one per line.
    ///
    /// # Errors
    ///
    /// Stops at the first failing value; earlier lines remain buffered.
    pub fn write_all<T, I>(&mut self, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.write(&value)?;
        }
        Ok(())
    }

    /// Returns the number of lines written so far.
    #[must_use]
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Flushes and consumes the writer, returning the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Row<'a> {
        id: u32,
        name: &'a str,
    }

    #[test]
    fn write_emits_one_line_per_value() {
        let mut writer = JsonlWriter::new(Vec::new());
        writer.write(&Row { id: 1, name: "a" }).unwrap();
        writer.write(&Row { id: 2, name: "b" }).unwrap();
        assert_eq!(writer.lines_written(), 2);

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n");
    }

    #[test]
    fn embedded_newlines_stay_on_one_line() {
        let mut writer = JsonlWriter::new(Vec::new());
        writer
            .write(&Row {
                id: 1,
                name: "first\nsecond",
            })
            .unwrap();

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn write_all_writes_every_value() {
        let mut writer = JsonlWriter::new(Vec::new());
        writer.write_all([1, 2, 3]).unwrap();
        assert_eq!(writer.lines_written(), 3);

        assert_eq!(writer.into_inner().unwrap(), b"1\n2\n3\n");
    }
}
