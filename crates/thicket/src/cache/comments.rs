//! Comment operations for the cache.

use rusqlite::{Connection, OptionalExtension, params};

use super::Cache;
use super::helpers::{COMMENTS_COLUMNS, format_time, row_to_comment};
use crate::domain::{Comment, CommentId, TicketId};
use crate::error::Result;

pub(super) fn write_comment(conn: &Connection, comment: &Comment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO comments (id, ticket_id, content, created) VALUES (?1, ?2, ?3, ?4)",
        params![
            comment.id.as_str(),
            comment.ticket_id.as_str(),
            comment.content,
            format_time(&comment.created),
        ],
    )?;
    Ok(())
}

impl Cache {
    /// Insert a comment.
    ///
    /// # Errors
    ///
    /// Returns a database error if the ID is already present.
    pub fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        write_comment(&self.conn, comment)?;
        Ok(())
    }

    /// Get a comment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_comment(&self, id: &CommentId) -> Result<Option<Comment>> {
        self.conn
            .query_row(
                &format!("SELECT {COMMENTS_COLUMNS} FROM comments WHERE id = ?1"),
                [id.as_str()],
                row_to_comment,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All comments on a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn comments_for_ticket(&self, ticket_id: &TicketId) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMENTS_COLUMNS} FROM comments WHERE ticket_id = ?1 ORDER BY created, id"
        ))?;
        let comments = stmt
            .query_map([ticket_id.as_str()], row_to_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub(super) fn all_comments(&self) -> Result<Vec<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COMMENTS_COLUMNS} FROM comments ORDER BY id"))?;
        let comments = stmt
            .query_map([], row_to_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::comment;
    use super::*;

    #[test]
    fn comments_for_ticket_are_chronological() {
        let mut cache = Cache::open_in_memory().unwrap();
        cache.insert_comment(&comment("TH-c000003", "TH-aaaaaa", 1)).unwrap();
        cache.insert_comment(&comment("TH-c000001", "TH-aaaaaa", 2)).unwrap();
        cache.insert_comment(&comment("TH-c000002", "TH-aaaaaa", 1)).unwrap();
        cache.insert_comment(&comment("TH-c000004", "TH-bbbbbb", 0)).unwrap();

        let ids: Vec<String> = cache
            .comments_for_ticket(&TicketId::new("TH-aaaaaa"))
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, ["TH-c000002", "TH-c000003", "TH-c000001"]);
    }

    #[test]
    fn comments_may_reference_unknown_tickets() {
        let mut cache = Cache::open_in_memory().unwrap();
        let orphan = comment("TH-c000001", "TH-zzzzzz", 0);
        cache.insert_comment(&orphan).unwrap();

        assert_eq!(cache.get_comment(&orphan.id).unwrap(), Some(orphan));
        assert_eq!(cache.get_comment(&CommentId::new("TH-cffffff")).unwrap(), None);
    }
}
