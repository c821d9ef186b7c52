//! Helper functions for database row conversion and parsing.
//!
//! Also provides SQL column list constants so every query selects columns in
//! the order the `row_to_*` functions expect.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use crate::domain::{Comment, Dependency, Ticket, TicketType};

/// SQL column list for the tickets table.
///
/// Use with `row_to_ticket` for consistent column ordering.
pub(crate) const TICKETS_COLUMNS: &str =
    "id, title, description, type, status, priority, assignee, created, updated";

/// SQL column list for the comments table.
pub(crate) const COMMENTS_COLUMNS: &str = "id, ticket_id, content, created";

/// SQL column list for the dependencies table.
pub(crate) const DEPENDENCIES_COLUMNS: &str = "id, from_ticket_id, to_ticket_id, type, created";

/// Formats a timestamp for storage.
///
/// Always nine fractional digits, so text order matches time order.
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parses a text column through `FromStr`.
///
/// Unknown values mean the cache was written by something else; the error
/// surfaces as a database error and the cache gets rebuilt.
fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert a database row to a [`Ticket`] with no labels.
///
/// Expected columns: see [`TICKETS_COLUMNS`]. Labels are loaded separately.
pub(crate) fn row_to_ticket(row: &Row) -> rusqlite::Result<Ticket> {
    let ticket_type = row
        .get::<_, Option<String>>(3)?
        .map(|raw| {
            raw.parse::<TicketType>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    Ok(Ticket {
        id: row.get::<_, String>(0)?.into(),
        title: row.get(1)?,
        description: row.get(2)?,
        ticket_type,
        status: parse_column(row, 4)?,
        priority: row.get(5)?,
        labels: Vec::new(),
        assignee: row.get(6)?,
        created: parse_time(row, 7)?,
        updated: parse_time(row, 8)?,
    })
}

/// Convert a database row to a [`Comment`].
pub(crate) fn row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get::<_, String>(0)?.into(),
        ticket_id: row.get::<_, String>(1)?.into(),
        content: row.get(2)?,
        created: parse_time(row, 3)?,
    })
}

/// Convert a database row to a [`Dependency`].
pub(crate) fn row_to_dependency(row: &Row) -> rusqlite::Result<Dependency> {
    Ok(Dependency {
        id: row.get::<_, String>(0)?.into(),
        from_ticket_id: row.get::<_, String>(1)?.into(),
        to_ticket_id: row.get::<_, String>(2)?.into(),
        kind: parse_column(row, 3)?,
        created: parse_time(row, 4)?,
    })
}
