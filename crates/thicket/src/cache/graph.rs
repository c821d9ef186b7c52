//! Blocking queries over the dependency edges.
//!
//! A ticket is ready when it is open and none of its direct `blocked_by`
//! targets is open. Blocking does not propagate: if A is blocked by B and B
//! is blocked by an open C, B is not ready but A's readiness depends only on
//! B's status.

use rusqlite::{OptionalExtension, params};

use super::Cache;
use super::helpers::TICKETS_COLUMNS;
use super::tickets::query_tickets;
use crate::domain::{Ticket, TicketId};
use crate::error::Result;

impl Cache {
    /// Every `blocked_by` edge as `(from, to)`, for building the cycle graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn blocked_by_edges(&self) -> Result<Vec<(TicketId, TicketId)>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_ticket_id, to_ticket_id FROM dependencies
             WHERE type = 'blocked_by' ORDER BY id",
        )?;
        let edges = stmt
            .query_map([], |row| {
                Ok((
                    TicketId::new(row.get::<_, String>(0)?),
                    TicketId::new(row.get::<_, String>(1)?),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    /// Open tickets with no open direct blocker, most urgent first.
    ///
    /// Edges pointing at tickets that don't exist are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_ready(&self) -> Result<Vec<Ticket>> {
        query_tickets(
            &self.conn,
            &format!(
                "SELECT {TICKETS_COLUMNS} FROM tickets t
                 WHERE t.status = 'open'
                   AND NOT EXISTS (
                       SELECT 1 FROM dependencies d
                       JOIN tickets b ON b.id = d.to_ticket_id
                       WHERE d.from_ticket_id = t.id
                         AND d.type = 'blocked_by'
                         AND b.status = 'open')
                 ORDER BY t.priority ASC, t.created ASC, t.id ASC"
            ),
            [],
        )
    }

    /// Tickets that `ticket_id` is blocked by, whatever their status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn blockers(&self, ticket_id: &TicketId) -> Result<Vec<Ticket>> {
        query_tickets(
            &self.conn,
            &format!(
                "SELECT {TICKETS_COLUMNS} FROM tickets
                 WHERE id IN (
                     SELECT to_ticket_id FROM dependencies
                     WHERE from_ticket_id = ?1 AND type = 'blocked_by')
                 ORDER BY priority ASC, created ASC, id ASC"
            ),
            [ticket_id.as_str()],
        )
    }

    /// Tickets blocked by `ticket_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn blocking(&self, ticket_id: &TicketId) -> Result<Vec<Ticket>> {
        query_tickets(
            &self.conn,
            &format!(
                "SELECT {TICKETS_COLUMNS} FROM tickets
                 WHERE id IN (
                     SELECT from_ticket_id FROM dependencies
                     WHERE to_ticket_id = ?1 AND type = 'blocked_by')
                 ORDER BY priority ASC, created ASC, id ASC"
            ),
            [ticket_id.as_str()],
        )
    }

    /// The ticket `ticket_id` was created from, if recorded and present.
    ///
    /// With several `created_from` edges the oldest wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn created_from(&self, ticket_id: &TicketId) -> Result<Option<Ticket>> {
        let parent: Option<String> = self
            .conn
            .query_row(
                "SELECT d.to_ticket_id FROM dependencies d
                 JOIN tickets t ON t.id = d.to_ticket_id
                 WHERE d.from_ticket_id = ?1 AND d.type = 'created_from'
                 ORDER BY d.created, d.id
                 LIMIT 1",
                [ticket_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match parent {
            Some(id) => self.get_ticket(&TicketId::new(id)),
            None => Ok(None),
        }
    }

    /// Whether `ticket_id` has at least one open direct blocker.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_blocked(&self, ticket_id: &TicketId) -> Result<bool> {
        let blocked = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM dependencies d
                 JOIN tickets b ON b.id = d.to_ticket_id
                 WHERE d.from_ticket_id = ?1
                   AND d.type = 'blocked_by'
                   AND b.status = 'open')",
            params![ticket_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(blocked)
    }
}
