//! Line codec for the ticket log.
//!
//! Each log line holds one of three record shapes with no explicit kind tag:
//!
//! | shape      | distinguishing field            |
//! |------------|---------------------------------|
//! | dependency | non-empty `from_ticket_id`      |
//! | comment    | non-empty `ticket_id`           |
//! | ticket     | neither                         |
//!
//! [`decode`] inspects the parsed JSON object for those fields before picking
//! a concrete type, and [`encode`] is its exact inverse.

use serde::Serialize;
use serde_json::Value;

use crate::domain::{Comment, Dependency, Ticket, ValidationError};

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// A ticket.
    Ticket(Ticket),
    /// A comment on a ticket.
    Comment(Comment),
    /// A dependency edge between tickets.
    Dependency(Dependency),
}

/// Record kind, as determined by field shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A ticket.
    Ticket,
    /// A comment.
    Comment,
    /// A dependency edge.
    Dependency,
}

impl Record {
    /// Returns the kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Ticket(_) => RecordKind::Ticket,
            Self::Comment(_) => RecordKind::Comment,
            Self::Dependency(_) => RecordKind::Dependency,
        }
    }

    /// Returns the record's own ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Ticket(t) => t.id.as_str(),
            Self::Comment(c) => c.id.as_str(),
            Self::Dependency(d) => d.id.as_str(),
        }
    }

    /// Validates the record's fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Ticket(t) => t.validate(),
            Self::Comment(c) => c.validate(),
            Self::Dependency(d) => d.validate(),
        }
    }
}

impl From<Ticket> for Record {
    fn from(ticket: Ticket) -> Self {
        Self::Ticket(ticket)
    }
}

impl From<Comment> for Record {
    fn from(comment: Comment) -> Self {
        Self::Comment(comment)
    }
}

impl From<Dependency> for Record {
    fn from(dependency: Dependency) -> Self {
        Self::Dependency(dependency)
    }
}

/// Classifies a parsed line by field presence.
#[must_use]
pub fn classify(value: &Value) -> RecordKind {
    let has = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };

    if has("from_ticket_id") {
        RecordKind::Dependency
    } else if has("ticket_id") {
        RecordKind::Comment
    } else {
        RecordKind::Ticket
    }
}

/// Decodes one log line.
///
/// Only shape is checked here; call [`Record::validate`] for field rules.
///
/// # Errors
///
/// Returns an error if the line is not JSON or does not match the shape its
/// fields select.
pub fn decode(line: &str) -> serde_json::Result<Record> {
    let value: Value = serde_json::from_str(line)?;
    match classify(&value) {
        RecordKind::Ticket => serde_json::from_value(value).map(Record::Ticket),
        RecordKind::Comment => serde_json::from_value(value).map(Record::Comment),
        RecordKind::Dependency => serde_json::from_value(value).map(Record::Dependency),
    }
}

/// Encodes a record as one compact JSON line, without the trailing newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(record: &Record) -> serde_json::Result<String> {
    serde_json::to_string(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CommentId, DependencyId, DependencyKind, Status, TicketId, TicketType,
    };
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use rstest::rstest;

    const TICKET_LINE: &str = r#"{"id":"TH-abc123","title":"Fix login","description":"Redirect loops","type":"bug","status":"open","priority":1,"labels":["auth","web"],"assignee":"sam","created":"2024-01-02T03:04:05.123456789Z","updated":"2024-01-02T03:04:05.123456789Z"}"#;
    const COMMENT_LINE: &str = r#"{"id":"TH-cc0ffee","ticket_id":"TH-abc123","content":"Reproduced on staging","created":"2024-01-03T00:00:00Z"}"#;
    const DEPENDENCY_LINE: &str = r#"{"id":"TH-dbeef01","from_ticket_id":"TH-abc123","to_ticket_id":"TH-xyz789","type":"blocked_by","created":"2024-01-04T00:00:00Z"}"#;

    #[rstest]
    #[case(TICKET_LINE, RecordKind::Ticket)]
    #[case(COMMENT_LINE, RecordKind::Comment)]
    #[case(DEPENDENCY_LINE, RecordKind::Dependency)]
    #[case(r#"{"id":"x","ticket_id":"","title":"t"}"#, RecordKind::Ticket)]
    #[case(r#"{"ticket_id":"TH-abc123","from_ticket_id":"TH-xyz789"}"#, RecordKind::Dependency)]
    fn classify_by_field_presence(#[case] line: &str, #[case] expected: RecordKind) {
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(classify(&value), expected);
    }

    #[test]
    fn decode_ticket_reads_every_field() {
        let Record::Ticket(ticket) = decode(TICKET_LINE).unwrap() else {
            panic!("expected a ticket");
        };
        assert_eq!(ticket.id.as_str(), "TH-abc123");
        assert_eq!(ticket.ticket_type, Some(TicketType::Bug));
        assert_eq!(ticket.status, Status::Open);
        assert_eq!(ticket.labels, ["auth", "web"]);
        assert_eq!(ticket.assignee.as_deref(), Some("sam"));
        assert_eq!(ticket.created.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn decode_accepts_null_labels_and_empty_optionals() {
        let line = r#"{"id":"TH-abc123","title":"t","description":"","type":"","status":"icebox","priority":0,"labels":null,"assignee":"","created":"2024-01-02T03:04:05Z","updated":"2024-01-02T03:04:05Z"}"#;
        let Record::Ticket(ticket) = decode(line).unwrap() else {
            panic!("expected a ticket");
        };
        assert!(ticket.labels.is_empty());
        assert_eq!(ticket.ticket_type, None);
        assert_eq!(ticket.assignee, None);
        assert_eq!(ticket.status, Status::Icebox);
    }

    #[test]
    fn decode_accepts_kebab_case_dependency_kind() {
        let line = DEPENDENCY_LINE.replace("blocked_by", "blocked-by");
        let Record::Dependency(dep) = decode(&line).unwrap() else {
            panic!("expected a dependency");
        };
        assert_eq!(dep.kind, DependencyKind::BlockedBy);
        assert!(encode(&Record::Dependency(dep)).unwrap().contains("\"blocked_by\""));
    }

    #[rstest]
    #[case::not_json("{not json")]
    #[case::bad_status(r#"{"id":"TH-abc123","title":"t","status":"doing","created":"2024-01-02T03:04:05Z","updated":"2024-01-02T03:04:05Z"}"#)]
    #[case::bad_kind(r#"{"id":"TH-dbeef01","from_ticket_id":"TH-abc123","to_ticket_id":"TH-xyz789","type":"relates","created":"2024-01-04T00:00:00Z"}"#)]
    #[case::missing_content(r#"{"id":"TH-cc0ffee","ticket_id":"TH-abc123","created":"2024-01-03T00:00:00Z"}"#)]
    fn decode_rejects_malformed_lines(#[case] line: &str) {
        assert!(decode(line).is_err());
    }

    #[rstest]
    #[case(TICKET_LINE)]
    #[case(COMMENT_LINE)]
    #[case(DEPENDENCY_LINE)]
    fn encode_reproduces_existing_lines(#[case] line: &str) {
        let record = decode(line).unwrap();
        assert_eq!(encode(&record).unwrap(), line);
    }

    #[test]
    fn validate_catches_what_decode_allows() {
        let line = TICKET_LINE.replace("\"Fix login\"", "\"   \"");
        let record = decode(&line).unwrap();
        assert_eq!(record.validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn record_reports_kind_and_id() {
        let record = decode(COMMENT_LINE).unwrap();
        assert_eq!(record.kind(), RecordKind::Comment);
        assert_eq!(record.id(), "TH-cc0ffee");
    }

    fn arb_time() -> impl Strategy<Value = DateTime<Utc>> {
        (0i64..4_000_000_000, 0u32..1_000_000_000)
            .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap_or_default())
    }

    fn arb_ticket() -> impl Strategy<Value = Ticket> {
        (
            "[A-Z]{2}-[a-z0-9]{6}",
            "\\PC{1,40}",
            "\\PC{0,80}",
            proptest::option::of(prop_oneof![
                Just(TicketType::Bug),
                Just(TicketType::Feature),
                Just(TicketType::Cleanup),
            ]),
            prop_oneof![Just(Status::Open), Just(Status::Closed), Just(Status::Icebox)],
            -5i32..100,
            proptest::collection::btree_set("[a-z_-]{1,10}", 0..4),
            proptest::option::of("[a-z]{1,12}"),
            arb_time(),
            arb_time(),
        )
            .prop_map(
                |(
                    id,
                    title,
                    description,
                    ticket_type,
                    status,
                    priority,
                    labels,
                    assignee,
                    created,
                    updated,
                )| Ticket {
                    id: TicketId::new(id),
                    title,
                    description,
                    ticket_type,
                    status,
                    priority,
                    labels: labels.into_iter().collect(),
                    assignee,
                    created,
                    updated,
                },
            )
    }

    fn arb_comment() -> impl Strategy<Value = Comment> {
        ("[A-Z]{2}-c[a-f0-9]{6}", "[A-Z]{2}-[a-z0-9]{6}", "\\PC{1,80}", arb_time()).prop_map(
            |(id, ticket_id, content, created)| Comment {
                id: CommentId::new(id),
                ticket_id: TicketId::new(ticket_id),
                content,
                created,
            },
        )
    }

    fn arb_dependency() -> impl Strategy<Value = Dependency> {
        (
            "[A-Z]{2}-d[a-f0-9]{6}",
            "[A-Z]{2}-[a-z0-9]{6}",
            "[A-Z]{2}-[a-z0-9]{6}",
            prop_oneof![Just(DependencyKind::BlockedBy), Just(DependencyKind::CreatedFrom)],
            arb_time(),
        )
            .prop_map(|(id, from, to, kind, created)| Dependency {
                id: DependencyId::new(id),
                from_ticket_id: TicketId::new(from),
                to_ticket_id: TicketId::new(to),
                kind,
                created,
            })
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        prop_oneof![
            arb_ticket().prop_map(Record::Ticket),
            arb_comment().prop_map(Record::Comment),
            arb_dependency().prop_map(Record::Dependency),
        ]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(record in arb_record()) {
            let line = encode(&record).unwrap();
            prop_assert!(!line.contains('\n'));
            prop_assert_eq!(decode(&line).unwrap(), record);
        }
    }
}
