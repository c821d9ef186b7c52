//! Ticket CRUD operations for the cache.

use rusqlite::{Connection, OptionalExtension, params};

use super::Cache;
use super::helpers::{TICKETS_COLUMNS, format_time, row_to_ticket};
use crate::domain::{Ticket, TicketFilter, TicketId};
use crate::error::{Error, Result};

/// Insert a ticket row and its labels.
pub(super) fn write_ticket(conn: &Connection, ticket: &Ticket) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tickets (id, title, description, type, status, priority, assignee, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            ticket.id.as_str(),
            ticket.title,
            ticket.description,
            ticket.ticket_type.map(|t| t.as_str()),
            ticket.status.as_str(),
            ticket.priority,
            ticket.assignee,
            format_time(&ticket.created),
            format_time(&ticket.updated),
        ],
    )?;
    write_labels(conn, ticket)
}

fn write_labels(conn: &Connection, ticket: &Ticket) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO ticket_labels (ticket_id, label, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, label) in ticket.labels.iter().enumerate() {
        let position = i64::try_from(position).unwrap_or(i64::MAX);
        stmt.execute(params![ticket.id.as_str(), label, position])?;
    }
    Ok(())
}

fn load_labels(conn: &Connection, ticket: &mut Ticket) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT label FROM ticket_labels WHERE ticket_id = ?1 ORDER BY position",
    )?;
    ticket.labels = stmt
        .query_map([ticket.id.as_str()], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(())
}

/// Run a ticket query and attach labels to every row.
pub(super) fn query_tickets<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Ticket>> {
    let mut stmt = conn.prepare(sql)?;
    let mut tickets = stmt
        .query_map(params, row_to_ticket)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for ticket in &mut tickets {
        load_labels(conn, ticket)?;
    }
    Ok(tickets)
}

impl Cache {
    /// Insert a new ticket.
    ///
    /// # Errors
    ///
    /// Returns a database error if the ID is already present.
    pub fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_ticket(&tx, ticket)?;
        tx.commit()?;
        Ok(())
    }

    /// Overwrite an existing ticket, labels included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if no row has this ID. Callers check
    /// existence first, so this indicates a bug.
    pub fn update_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE tickets SET title = ?2, description = ?3, type = ?4, status = ?5,
             priority = ?6, assignee = ?7, created = ?8, updated = ?9 WHERE id = ?1",
            params![
                ticket.id.as_str(),
                ticket.title,
                ticket.description,
                ticket.ticket_type.map(|t| t.as_str()),
                ticket.status.as_str(),
                ticket.priority,
                ticket.assignee,
                format_time(&ticket.created),
                format_time(&ticket.updated),
            ],
        )?;
        if updated == 0 {
            return Err(Error::TicketNotFound(ticket.id.clone()));
        }

        tx.execute(
            "DELETE FROM ticket_labels WHERE ticket_id = ?1",
            [ticket.id.as_str()],
        )?;
        write_labels(&tx, ticket)?;

        tx.commit()?;
        Ok(())
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        let ticket = self
            .conn
            .query_row(
                &format!("SELECT {TICKETS_COLUMNS} FROM tickets WHERE id = ?1"),
                [id.as_str()],
                row_to_ticket,
            )
            .optional()?;

        match ticket {
            Some(mut ticket) => {
                load_labels(&self.conn, &mut ticket)?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    /// Check whether a ticket exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn ticket_exists(&self, id: &TicketId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = ?1)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// List tickets matching `filter`, most urgent first.
    ///
    /// Ordered by priority, then creation time, then ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        // SQLite treats a negative LIMIT as no limit.
        let limit = filter
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        query_tickets(
            &self.conn,
            &format!(
                "SELECT {TICKETS_COLUMNS} FROM tickets t
                 WHERE (?1 IS NULL OR t.status = ?1)
                   AND (?2 IS NULL OR EXISTS (
                        SELECT 1 FROM ticket_labels l WHERE l.ticket_id = t.id AND l.label = ?2))
                 ORDER BY t.priority ASC, t.created ASC, t.id ASC
                 LIMIT ?3"
            ),
            params![filter.status.map(|s| s.as_str()), filter.label, limit],
        )
    }

    pub(super) fn all_tickets(&self) -> Result<Vec<Ticket>> {
        query_tickets(
            &self.conn,
            &format!("SELECT {TICKETS_COLUMNS} FROM tickets ORDER BY id"),
            [],
        )
    }
}
