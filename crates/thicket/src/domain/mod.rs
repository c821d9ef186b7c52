//! Domain types for ticket tracking.
//!
//! This module contains the record types persisted in the log (tickets,
//! comments, dependencies), their identifiers, and the field-level validation
//! rules shared by the codec and the mutation API.

mod comment;
mod dependency;
mod ticket;

pub use comment::Comment;
pub use dependency::{Dependency, DependencyKind};
pub use ticket::{NewTicket, Status, Ticket, TicketFilter, TicketType, TicketUpdate};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a single label.
pub const MAX_LABEL_LENGTH: usize = 30;

/// Length of the random body of every identifier.
const ID_BODY_LENGTH: usize = 6;

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Ticket ID is not `XX-xxxxxx`.
    #[error("invalid ticket ID format: '{0}'")]
    InvalidTicketId(String),

    /// Comment ID is not `XX-cxxxxxx`.
    #[error("invalid comment ID format: '{0}'")]
    InvalidCommentId(String),

    /// Dependency ID is not `XX-dxxxxxx`.
    #[error("invalid dependency ID format: '{0}'")]
    InvalidDependencyId(String),

    /// Project code is not exactly two uppercase ASCII letters.
    #[error("project code must be exactly two uppercase letters, got '{0}'")]
    InvalidProjectCode(String),

    /// Title is empty after trimming.
    #[error("ticket title cannot be empty")]
    EmptyTitle,

    /// Assignee is `Some("")`, which the log cannot tell apart from unset.
    #[error("assignee cannot be empty; use no assignee instead")]
    BlankAssignee,

    /// Comment content is empty after trimming.
    #[error("comment content cannot be empty")]
    EmptyComment,

    /// Label has the wrong length or characters.
    #[error(
        "invalid label '{0}': must be 1-{max} alphanumeric characters, hyphens, or underscores",
        max = MAX_LABEL_LENGTH
    )]
    InvalidLabel(String),

    /// Label appears more than once on a ticket.
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    /// Unknown ticket status.
    #[error("invalid ticket status: '{0}'")]
    InvalidStatus(String),

    /// Unknown ticket type.
    #[error("invalid ticket type: '{0}'")]
    InvalidTicketType(String),

    /// Unknown dependency kind.
    #[error("invalid dependency type: '{0}'")]
    InvalidDependencyKind(String),

    /// A dependency points from a ticket to itself.
    #[error("ticket {0} cannot depend on itself")]
    SelfDependency(TicketId),
}

/// Two-letter prefix shared by every ID in a project (e.g. `TH`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectCode(String);

impl ProjectCode {
    /// Parses a project code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidProjectCode`] unless `code` is exactly
    /// two uppercase ASCII letters.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if is_project_code(&code) {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidProjectCode(code))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProjectCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectCode> for String {
    fn from(code: ProjectCode) -> Self {
        code.0
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, marker = $marker:expr, body = $body:expr, error = $err:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a string without validating it.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Wraps a string, rejecting malformed IDs.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] if the ID has the wrong shape.
            pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = Self(id.into());
                id.validate()?;
                Ok(id)
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Checks the ID shape.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] if the ID has the wrong shape.
            pub fn validate(&self) -> Result<(), ValidationError> {
                if has_id_shape(&self.0, $marker, $body) {
                    Ok(())
                } else {
                    Err(ValidationError::$err(self.0.clone()))
                }
            }

            /// Returns the project code prefix of a well-formed ID.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] if the ID has the wrong shape.
            pub fn project_code(&self) -> Result<ProjectCode, ValidationError> {
                self.validate()?;
                ProjectCode::new(&self.0[..2])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    /// Ticket identifier: project code, hyphen, six lowercase base36 chars (`TH-a1b2c3`).
    TicketId,
    marker = None,
    body = is_base36_lower,
    error = InvalidTicketId
);

define_id!(
    /// Comment identifier: project code, `-c`, six lowercase hex chars (`TH-c0f3a91`).
    CommentId,
    marker = Some(b'c'),
    body = is_hex_lower,
    error = InvalidCommentId
);

define_id!(
    /// Dependency identifier: project code, `-d`, six lowercase hex chars (`TH-d0f3a91`).
    DependencyId,
    marker = Some(b'd'),
    body = is_hex_lower,
    error = InvalidDependencyId
);

fn is_project_code(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_uppercase())
}

fn is_base36_lower(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

fn is_hex_lower(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'a'..=b'f')
}

// Explicit byte checks rather than a regex dependency.
fn has_id_shape(id: &str, marker: Option<u8>, body: fn(u8) -> bool) -> bool {
    let bytes = id.as_bytes();
    let body_start = 3 + usize::from(marker.is_some());

    if bytes.len() != body_start + ID_BODY_LENGTH || !id.is_ascii() {
        return false;
    }
    if !is_project_code(&id[..2]) || bytes[2] != b'-' {
        return false;
    }
    if let Some(marker) = marker
        && bytes[3] != marker
    {
        return false;
    }
    bytes[body_start..].iter().all(|&b| body(b))
}

/// Validates a single label: 1-30 characters of `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidLabel`] on failure.
pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    let valid = !label.is_empty()
        && label.len() <= MAX_LABEL_LENGTH
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidLabel(label.to_string()))
    }
}

/// Validates every label and rejects repeats.
///
/// # Errors
///
/// Returns the first [`ValidationError::InvalidLabel`] or
/// [`ValidationError::DuplicateLabel`] found.
pub fn validate_labels(labels: &[String]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::with_capacity(labels.len());
    for label in labels {
        validate_label(label)?;
        if !seen.insert(label.as_str()) {
            return Err(ValidationError::DuplicateLabel(label.clone()));
        }
    }
    Ok(())
}

/// Serde adapters for fields the log writes as `""` when unset.
pub(crate) mod empty_as_none {
    use serde::de::IntoDeserializer;
    use serde::de::value::StringDeserializer;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => {
                let de: StringDeserializer<D::Error> = s.into_deserializer();
                T::deserialize(de).map(Some)
            }
        }
    }
}

/// Accepts `null` for a list field, reading it as empty.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
