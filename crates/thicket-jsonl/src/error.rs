//! Error types for thicket-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for thicket-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error while writing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line could not be decoded.
    ///
    /// `line_number` is 1-based and counts every physical line, blank ones
    /// included, so it matches what an editor shows.
    #[error("line {line_number}: {source}")]
    Parse {
        /// The 1-based line number of the offending line.
        line_number: usize,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A line is not valid UTF-8.
    #[error("line {line_number}: {source}")]
    InvalidUtf8 {
        /// The 1-based line number of the offending line.
        line_number: usize,
        /// The underlying UTF-8 error.
        #[source]
        source: std::str::Utf8Error,
    },
}

impl Error {
    /// Returns the line number for errors tied to one line, `None` otherwise.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::Parse { line_number, .. } | Self::InvalidUtf8 { line_number, .. } => {
                Some(*line_number)
            }
            _ => None,
        }
    }
}

/// A specialized Result type for thicket-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
