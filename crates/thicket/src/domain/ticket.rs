use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{
    TicketId, ValidationError, empty_as_none, null_as_empty, validate_label, validate_labels,
};

/// Status of a ticket.
///
/// Only [`Status::Open`] blocks other tickets or counts toward the ready set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Actionable work.
    Open,

    /// Finished.
    Closed,

    /// Parked; neither blocking nor ready.
    Icebox,
}

impl Status {
    /// Returns the on-disk spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Icebox => "icebox",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "icebox" => Ok(Self::Icebox),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

/// Category of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    /// Defect.
    Bug,

    /// New capability.
    Feature,

    /// General work item.
    Task,

    /// Parent of other tickets.
    Epic,

    /// Maintenance and tidying.
    Cleanup,
}

impl TicketType {
    /// Returns the on-disk spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "task" => Ok(Self::Task),
            "epic" => Ok(Self::Epic),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(ValidationError::InvalidTicketType(other.to_string())),
        }
    }
}

/// A ticket in the tracker.
///
/// Field names and the `""`-for-unset convention for `type` and `assignee`
/// match the log file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier, stable for the ticket's life.
    pub id: TicketId,

    /// Non-empty title.
    pub title: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Optional category.
    #[serde(rename = "type", default, with = "empty_as_none")]
    pub ticket_type: Option<TicketType>,

    /// Current status.
    pub status: Status,

    /// Priority; lower is more urgent.
    #[serde(default)]
    pub priority: i32,

    /// Ordered, duplicate-free labels.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<String>,

    /// Optional assignee.
    #[serde(default, with = "empty_as_none")]
    pub assignee: Option<String>,

    /// Creation timestamp.
    pub created: DateTime<Utc>,

    /// Last modification timestamp.
    pub updated: DateTime<Utc>,
}

impl Ticket {
    /// Builds a new open ticket from user input.
    ///
    /// Title, description and assignee are trimmed; a blank assignee becomes
    /// `None`. Both timestamps are set to `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a malformed ID, an empty title, or
    /// invalid labels.
    pub fn new(id: TicketId, new: NewTicket, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        id.validate()?;

        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        validate_labels(&new.labels)?;

        Ok(Self {
            id,
            title,
            description: new.description.trim().to_string(),
            ticket_type: new.ticket_type,
            status: Status::Open,
            priority: new.priority,
            labels: new.labels,
            assignee: normalize_assignee(new.assignee),
            created: now,
            updated: now,
        })
    }

    /// Checks that the ticket could have been produced by [`Ticket::new`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.id.validate()?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        // The log writes a missing assignee as "", so an empty one cannot survive a rebuild.
        if self.assignee.as_deref().is_some_and(str::is_empty) {
            return Err(ValidationError::BlankAssignee);
        }
        validate_labels(&self.labels)
    }

    /// Applies an update and bumps `updated` to `now`.
    ///
    /// All inputs are validated before anything changes, so a rejected update
    /// leaves the ticket untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] for a blank new title or
    /// [`ValidationError::InvalidLabel`] for a bad added label.
    pub fn apply(
        &mut self,
        update: TicketUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let title = match update.title {
            Some(title) => {
                let trimmed = title.trim().to_string();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyTitle);
                }
                Some(trimmed)
            }
            None => None,
        };
        for label in &update.add_labels {
            validate_label(label)?;
        }

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(ticket_type) = update.ticket_type {
            self.ticket_type = ticket_type;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(assignee) = update.assignee {
            self.assignee = normalize_assignee(assignee);
        }

        for label in update.add_labels {
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
        if !update.remove_labels.is_empty() {
            self.labels.retain(|l| !update.remove_labels.contains(l));
        }

        self.updated = now;
        Ok(())
    }

    /// Marks the ticket closed.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = Status::Closed;
        self.updated = now;
    }

    /// Returns true if the ticket is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }
}

fn normalize_assignee(assignee: Option<String>) -> Option<String> {
    assignee
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Data for creating a new ticket.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    /// Ticket title
    pub title: String,

    /// Ticket description
    pub description: String,

    /// Ticket type (optional)
    pub ticket_type: Option<TicketType>,

    /// Priority (lower = more urgent)
    pub priority: i32,

    /// Labels
    pub labels: Vec<String>,

    /// Assignee (optional)
    pub assignee: Option<String>,
}

impl NewTicket {
    /// Starts a new ticket with the given title and defaults elsewhere.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Data for updating an existing ticket.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    /// New title (if updating)
    pub title: Option<String>,

    /// New description (if updating)
    pub description: Option<String>,

    /// New type (if updating, `Some(None)` to clear)
    pub ticket_type: Option<Option<TicketType>>,

    /// New priority (if updating)
    pub priority: Option<i32>,

    /// New status (if updating)
    pub status: Option<Status>,

    /// New assignee (if updating, `Some(None)` to clear)
    pub assignee: Option<Option<String>>,

    /// Labels to add; existing ones are skipped
    pub add_labels: Vec<String>,

    /// Labels to remove
    pub remove_labels: Vec<String>,
}

/// Filter for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status
    pub status: Option<Status>,

    /// Filter by label (exact, case-sensitive)
    pub label: Option<String>,

    /// Limit number of results
    pub limit: Option<usize>,
}
