use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DependencyId, TicketId, ValidationError};

/// Type of dependency relationship.
///
/// Written in snake case; the kebab-case spellings are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// The source ticket cannot proceed while the target is open.
    #[serde(alias = "blocked-by")]
    BlockedBy,

    /// The source ticket was spun off from the target. Informational only.
    #[serde(alias = "created-from")]
    CreatedFrom,
}

impl DependencyKind {
    /// Returns the on-disk spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockedBy => "blocked_by",
            Self::CreatedFrom => "created_from",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked_by" | "blocked-by" => Ok(Self::BlockedBy),
            "created_from" | "created-from" => Ok(Self::CreatedFrom),
            other => Err(ValidationError::InvalidDependencyKind(other.to_string())),
        }
    }
}

/// A directed edge between two tickets. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier.
    pub id: DependencyId,

    /// The ticket that has the dependency.
    pub from_ticket_id: TicketId,

    /// The ticket being referenced.
    pub to_ticket_id: TicketId,

    /// Relationship kind.
    #[serde(rename = "type")]
    pub kind: DependencyKind,

    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

impl Dependency {
    /// Builds a dependency edge.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for malformed IDs or a self-edge.
    pub fn new(
        id: DependencyId,
        from_ticket_id: TicketId,
        to_ticket_id: TicketId,
        kind: DependencyKind,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let dependency = Self {
            id,
            from_ticket_id,
            to_ticket_id,
            kind,
            created: now,
        };
        dependency.validate()?;
        Ok(dependency)
    }

    /// Checks ID shapes and rejects self-edges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.id.validate()?;
        self.from_ticket_id.validate()?;
        self.to_ticket_id.validate()?;
        if self.from_ticket_id == self.to_ticket_id {
            return Err(ValidationError::SelfDependency(self.from_ticket_id.clone()));
        }
        Ok(())
    }

    /// Returns true for `blocked_by` edges.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.kind == DependencyKind::BlockedBy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\"blocked_by\"", DependencyKind::BlockedBy)]
    #[case("\"blocked-by\"", DependencyKind::BlockedBy)]
    #[case("\"created_from\"", DependencyKind::CreatedFrom)]
    #[case("\"created-from\"", DependencyKind::CreatedFrom)]
    fn kind_accepts_both_spellings(#[case] json: &str, #[case] expected: DependencyKind) {
        let kind: DependencyKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind, expected);
    }

    #[test]
    fn kind_is_written_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&DependencyKind::BlockedBy).unwrap(),
            "\"blocked_by\""
        );
        assert_eq!(DependencyKind::CreatedFrom.to_string(), "created_from");
    }

    #[test]
    fn self_edge_rejected() {
        let err = Dependency::new(
            DependencyId::new("TH-d000001"),
            TicketId::new("TH-aaaaaa"),
            TicketId::new("TH-aaaaaa"),
            DependencyKind::CreatedFrom,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::SelfDependency(TicketId::new("TH-aaaaaa")));
    }

    #[test]
    fn valid_edge_accepted() {
        let dep = Dependency::new(
            DependencyId::new("TH-d000001"),
            TicketId::new("TH-aaaaaa"),
            TicketId::new("TH-bbbbbb"),
            DependencyKind::BlockedBy,
            Utc::now(),
        )
        .unwrap();
        assert!(dep.is_blocking());
    }
}
