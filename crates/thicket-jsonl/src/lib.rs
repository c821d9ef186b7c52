//! JSON Lines plumbing for the thicket ticket log.
//!
//! This crate provides synchronous, line-numbered reading of JSONL data,
//! buffered writing, and crash-safe whole-file rewrites. It knows nothing
//! about tickets; record shapes live in the `thicket` crate.
//!
//! # Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use thicket_jsonl::{write_jsonl_atomic, JsonlReader};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Row {
//!     id: u32,
//! }
//!
//! # fn example() -> thicket_jsonl::Result<()> {
//! write_jsonl_atomic("rows.jsonl", &[Row { id: 1 }, Row { id: 2 }])?;
//!
//! let mut reader = JsonlReader::new(std::fs::File::open("rows.jsonl")?);
//! let rows: Vec<Row> = reader.read_all()?;
//! assert_eq!(rows.len(), 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod writer;

pub use atomic::{write_atomic_with, write_jsonl_atomic, write_jsonl_atomic_iter};
pub use error::{Error, Result};
pub use reader::JsonlReader;
pub use writer::JsonlWriter;
