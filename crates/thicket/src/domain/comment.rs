use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommentId, TicketId, ValidationError};

/// A comment on a ticket. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: CommentId,

    /// The ticket this comment belongs to. Not checked for existence.
    pub ticket_id: TicketId,

    /// Comment text.
    pub content: String,

    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

impl Comment {
    /// Builds a comment, trimming `content`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for malformed IDs or blank content.
    pub fn new(
        id: CommentId,
        ticket_id: TicketId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let comment = Self {
            id,
            ticket_id,
            content: content.trim().to_string(),
            created: now,
        };
        comment.validate()?;
        Ok(comment)
    }

    /// Checks ID shapes and non-empty content.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.id.validate()?;
        self.ticket_id.validate()?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(())
    }
}
