//! Error types for thicket storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{DependencyKind, TicketId, ValidationError};
use crate::id_generation::IdGenerationError;

/// The error type for thicket storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Cache database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The log file could not be read or written.
    #[error("Log error: {0}")]
    Log(#[from] thicket_jsonl::Error),

    /// A log line decoded but holds an invalid record.
    #[error("Invalid record on line {line_number}: {source}")]
    InvalidRecord {
        /// 1-based line number in the log.
        line_number: usize,
        /// What was wrong with the record.
        #[source]
        source: ValidationError,
    },

    /// The log holds two records with the same ID.
    #[error("Duplicate record ID '{id}' on line {line_number}")]
    DuplicateRecord {
        /// 1-based line number of the second occurrence.
        line_number: usize,
        /// The repeated ID.
        id: String,
    },

    /// The log holds two dependency records for the same edge.
    #[error("Duplicate dependency {from} {kind} {to} on line {line_number}")]
    DuplicateEdgeRecord {
        /// 1-based line number of the second occurrence.
        line_number: usize,
        /// Source ticket.
        from: TicketId,
        /// Target ticket.
        to: TicketId,
        /// Edge kind.
        kind: DependencyKind,
    },

    /// Input failed field validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No ticket with this ID exists.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// A ticket with this ID already exists.
    #[error("Ticket already exists: {0}")]
    DuplicateTicket(TicketId),

    /// A comment or dependency with this ID already exists.
    #[error("Record already exists: {0}")]
    DuplicateId(String),

    /// The exact `(from, to, kind)` edge already exists.
    #[error("Dependency already exists: {from} {kind} {to}")]
    DuplicateDependency {
        /// Source ticket.
        from: TicketId,
        /// Target ticket.
        to: TicketId,
        /// Edge kind.
        kind: DependencyKind,
    },

    /// Adding the edge would close a `blocked_by` cycle.
    #[error("Circular dependency: {to} already depends on {from}")]
    CircularDependency {
        /// Source ticket of the rejected edge.
        from: TicketId,
        /// Target ticket of the rejected edge.
        to: TicketId,
    },

    /// The log was written but the cache could not be brought in line.
    ///
    /// The mutation is durable; the next open rebuilds the cache.
    #[error("Change saved to the log but the cache could not be updated: {source}")]
    CacheSync {
        /// The failure from the recovery rebuild.
        #[source]
        source: Box<Error>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No data directory at the given path.
    #[error("Not initialized: {} does not exist", .0.display())]
    NotInitialized(PathBuf),

    /// The data directory already exists.
    #[error("Already initialized: {} exists", .0.display())]
    AlreadyInitialized(PathBuf),

    /// ID generation failed.
    #[error("ID generation error: {0}")]
    IdGeneration(#[from] IdGenerationError),
}

impl Error {
    /// Returns true if the error came from the cache database.
    ///
    /// The cache is derived data, so these are recoverable by recreating it.
    #[must_use]
    pub fn is_cache_error(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::CacheSync { source } => source.is_cache_error(),
            _ => false,
        }
    }
}

/// A specialized Result type for thicket operations.
pub type Result<T> = std::result::Result<T, Error>;
