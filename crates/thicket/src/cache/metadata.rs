//! Key-value metadata, including the log checkpoint.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::Cache;
use crate::error::Result;
use crate::log_store::LogFingerprint;

/// Metadata key holding the fingerprint of the log the cache was built from.
pub const CHECKPOINT_KEY: &str = "log_fingerprint";

pub(super) fn write_metadata(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

impl Cache {
    /// Get a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Set a metadata value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        write_metadata(&self.conn, key, value)?;
        Ok(())
    }

    /// Remove a metadata value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_metadata(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM metadata WHERE key = ?1", [key])?;
        Ok(())
    }

    /// The fingerprint of the log this cache reflects.
    ///
    /// An unreadable value is treated as absent, which forces a rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn checkpoint(&self) -> Result<Option<LogFingerprint>> {
        let Some(raw) = self.get_metadata(CHECKPOINT_KEY)? else {
            return Ok(None);
        };
        match raw.parse() {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(e) => {
                warn!(value = %raw, error = %e, "Ignoring unreadable cache checkpoint");
                Ok(None)
            }
        }
    }

    /// Record the fingerprint of the log this cache now reflects.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_checkpoint(&mut self, fingerprint: LogFingerprint) -> Result<()> {
        self.set_metadata(CHECKPOINT_KEY, &fingerprint.to_string())
    }

    /// Forget the checkpoint so the next sync rebuilds.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear_checkpoint(&mut self) -> Result<()> {
        self.delete_metadata(CHECKPOINT_KEY)
    }
}
