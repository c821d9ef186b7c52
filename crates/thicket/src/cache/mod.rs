//! `SQLite` cache of the ticket log.
//!
//! The cache is derived data: every table can be rebuilt from the log with no
//! loss, and it is safe to delete the file at any time. It exists so lookups,
//! filtered scans and graph queries don't have to re-read the whole log.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)
//! - `helpers` - Row conversion and parsing utilities
//! - `tickets` - Ticket CRUD and filtered listing
//! - `comments` - Comment insert and lookup
//! - `dependencies` - Dependency insert and lookup
//! - `metadata` - Key-value metadata and the log checkpoint
//! - `graph` - Blocking queries and the ready set

mod comments;
mod dependencies;
mod graph;
mod helpers;
mod metadata;
mod schema;
mod tickets;

pub(crate) use schema::{DROP_SCHEMA, SCHEMA, SCHEMA_VERSION};

use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::log_store::{LogContents, LogFingerprint};

pub use metadata::CHECKPOINT_KEY;

/// Record counts held by the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of tickets.
    pub tickets: usize,
    /// Number of tickets with status `open`.
    pub open_tickets: usize,
    /// Number of comments.
    pub comments: usize,
    /// Number of dependency edges.
    pub dependencies: usize,
}

/// `SQLite` database wrapper for the ticket cache.
///
/// Writes take `&mut self`; single-record inserts and updates run in their own
/// transaction. A cache too damaged to open is discarded with
/// [`remove_files`](Self::remove_files) and recreated.
pub struct Cache {
    conn: Connection,
}

impl Cache {
    /// Open or create the cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened as a `SQLite` database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(&conn)?;

        Ok(Self { conn })
    }

    /// Create a cache that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version != 0 && version != SCHEMA_VERSION {
            warn!(
                found = version,
                expected = SCHEMA_VERSION,
                "Cache schema version mismatch, dropping tables"
            );
            conn.execute_batch(DROP_SCHEMA)?;
        }

        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// Delete a cache database and its WAL sidecars without opening it.
    ///
    /// Used when the file is too damaged to open. Missing files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be deleted.
    pub fn remove_files(path: &Path) -> Result<()> {
        remove_file_if_exists(path)?;
        // SQLite names sidecars by appending to the full file name.
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.as_os_str().to_owned();
            sidecar.push(suffix);
            remove_file_if_exists(Path::new(&sidecar))?;
        }
        Ok(())
    }

    /// Replace the entire contents with `contents` and record `checkpoint`.
    ///
    /// Runs in one transaction: readers see either the old cache or the new
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub fn rebuild(&mut self, contents: &LogContents, checkpoint: LogFingerprint) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute_batch(
            "DELETE FROM ticket_labels;
             DELETE FROM tickets;
             DELETE FROM comments;
             DELETE FROM dependencies;",
        )?;

        for ticket in &contents.tickets {
            tickets::write_ticket(&tx, ticket)?;
        }
        for comment in &contents.comments {
            comments::write_comment(&tx, comment)?;
        }
        for dependency in &contents.dependencies {
            dependencies::write_dependency(&tx, dependency)?;
        }
        metadata::write_metadata(&tx, CHECKPOINT_KEY, &checkpoint.to_string())?;

        tx.commit()?;

        info!(
            tickets = contents.tickets.len(),
            comments = contents.comments.len(),
            dependencies = contents.dependencies.len(),
            %checkpoint,
            "Rebuilt cache"
        );
        Ok(())
    }

    /// Read back everything the cache holds, grouped and sorted like the log.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be decoded.
    pub fn snapshot(&self) -> Result<LogContents> {
        let mut contents = LogContents {
            tickets: self.all_tickets()?,
            comments: self.all_comments()?,
            dependencies: self.all_dependencies()?,
        };
        contents.sort();
        Ok(contents)
    }

    /// Get record counts.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<CacheStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            usize::try_from(n).map_err(|e| Error::Config(format!("invalid row count {n}: {e}")))
        };

        Ok(CacheStats {
            tickets: count("SELECT COUNT(*) FROM tickets")?,
            open_tickets: count("SELECT COUNT(*) FROM tickets WHERE status = 'open'")?,
            comments: count("SELECT COUNT(*) FROM comments")?,
            dependencies: count("SELECT COUNT(*) FROM dependencies")?,
        })
    }

    /// Every record ID in the cache, for seeding ID generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn known_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM tickets
             UNION ALL SELECT id FROM comments
             UNION ALL SELECT id FROM dependencies",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Close the connection, surfacing any error `SQLite` reports.
    ///
    /// # Errors
    ///
    /// Returns the close error, e.g. when a WAL checkpoint fails.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Remove a file, ignoring `NotFound` errors (the file may not exist).
fn remove_file_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to delete cache file");
            Err(Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to delete {}: {e}", path.display()),
            )))
        }
    }
}
