//! Dependency edge operations for the cache.

use rusqlite::{Connection, params};

use super::Cache;
use super::helpers::{DEPENDENCIES_COLUMNS, format_time, row_to_dependency};
use crate::domain::{Dependency, DependencyKind, TicketId};
use crate::error::Result;

pub(super) fn write_dependency(conn: &Connection, dependency: &Dependency) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO dependencies (id, from_ticket_id, to_ticket_id, type, created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            dependency.id.as_str(),
            dependency.from_ticket_id.as_str(),
            dependency.to_ticket_id.as_str(),
            dependency.kind.as_str(),
            format_time(&dependency.created),
        ],
    )?;
    Ok(())
}

impl Cache {
    /// Insert a dependency edge.
    ///
    /// # Errors
    ///
    /// Returns a database error if the ID or the `(from, to, kind)` triple is
    /// already present.
    pub fn insert_dependency(&mut self, dependency: &Dependency) -> Result<()> {
        write_dependency(&self.conn, dependency)?;
        Ok(())
    }

    /// Edges leaving `ticket_id`, optionally restricted to one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependencies_from(
        &self,
        ticket_id: &TicketId,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<Dependency>> {
        self.edges("from_ticket_id", ticket_id, kind)
    }

    /// Edges arriving at `ticket_id`, optionally restricted to one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependencies_to(
        &self,
        ticket_id: &TicketId,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<Dependency>> {
        self.edges("to_ticket_id", ticket_id, kind)
    }

    fn edges(
        &self,
        column: &str,
        ticket_id: &TicketId,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<Dependency>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEPENDENCIES_COLUMNS} FROM dependencies
             WHERE {column} = ?1 AND (?2 IS NULL OR type = ?2)
             ORDER BY created, id"
        ))?;
        let edges = stmt
            .query_map(
                params![ticket_id.as_str(), kind.map(DependencyKind::as_str)],
                row_to_dependency,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    /// Check whether the exact `(from, to, kind)` edge exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependency_exists(
        &self,
        from: &TicketId,
        to: &TicketId,
        kind: DependencyKind,
    ) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM dependencies
             WHERE from_ticket_id = ?1 AND to_ticket_id = ?2 AND type = ?3)",
            params![from.as_str(), to.as_str(), kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub(super) fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEPENDENCIES_COLUMNS} FROM dependencies ORDER BY id"
        ))?;
        let edges = stmt
            .query_map([], row_to_dependency)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}
