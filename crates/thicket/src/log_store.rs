//! The ticket log: the single source of truth.
//!
//! The log is a JSON Lines file holding every ticket, comment and dependency.
//! Every write is a full, atomic rewrite in canonical order: tickets, then
//! comments, then dependencies, each group sorted by ID. Two processes that
//! write the same records therefore produce byte-identical files, and diffs
//! under version control stay small.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use thicket_jsonl::{JsonlReader, write_atomic_with};
use tracing::{debug, trace};

use crate::codec::{self, Record};
use crate::domain::{Comment, Dependency, Ticket};
use crate::error::{Error, Result};

/// Everything held in the log, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContents {
    /// All tickets.
    pub tickets: Vec<Ticket>,
    /// All comments.
    pub comments: Vec<Comment>,
    /// All dependency edges.
    pub dependencies: Vec<Dependency>,
}

impl LogContents {
    /// Adds a record to the matching group.
    pub fn push(&mut self, record: Record) {
        match record {
            Record::Ticket(t) => self.tickets.push(t),
            Record::Comment(c) => self.comments.push(c),
            Record::Dependency(d) => self.dependencies.push(d),
        }
    }

    /// Sorts each group by ID.
    pub fn sort(&mut self) {
        self.tickets.sort_by(|a, b| a.id.cmp(&b.id));
        self.comments.sort_by(|a, b| a.id.cmp(&b.id));
        self.dependencies.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len() + self.comments.len() + self.dependencies.len()
    }

    /// Returns true if there are no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_id(&self, id: &str) -> bool {
        self.tickets.iter().any(|t| t.id.as_str() == id)
            || self.comments.iter().any(|c| c.id.as_str() == id)
            || self.dependencies.iter().any(|d| d.id.as_str() == id)
    }
}

/// Identity of one version of the log file.
///
/// Pairs the modification time in nanoseconds with the byte length, so an
/// external rewrite inside the filesystem's timestamp granularity is still
/// noticed when the size changes. A missing file is `(0, 0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFingerprint {
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified_ns: u128,
    /// File length in bytes.
    pub len: u64,
}

impl fmt::Display for LogFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.modified_ns, self.len)
    }
}

impl FromStr for LogFingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid log fingerprint '{s}'"));
        let (modified, len) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            modified_ns: modified.parse().map_err(|_| invalid())?,
            len: len.parse().map_err(|_| invalid())?,
        })
    }
}

/// Reads and rewrites the log file at a fixed path.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    /// Creates a store for the log at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in the log.
    ///
    /// A missing file reads as empty. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Any line that does not decode ([`Error::Log`]), fails validation
    /// ([`Error::InvalidRecord`]), repeats an earlier ID
    /// ([`Error::DuplicateRecord`]), or repeats an earlier `(from, to, kind)`
    /// edge ([`Error::DuplicateEdgeRecord`]) aborts the whole read with its
    /// line number.
    pub fn read_all(&self) -> Result<LogContents> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "log file missing, reading as empty");
                return Ok(LogContents::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = JsonlReader::new(file);
        let mut contents = LogContents::default();
        let mut seen = HashSet::new();
        let mut edges = HashSet::new();

        while let Some(record) = reader.read_line_with(codec::decode)? {
            let line_number = reader.line_number();
            record
                .validate()
                .map_err(|source| Error::InvalidRecord {
                    line_number,
                    source,
                })?;
            if !seen.insert(record.id().to_string()) {
                return Err(Error::DuplicateRecord {
                    line_number,
                    id: record.id().to_string(),
                });
            }
            if let Record::Dependency(dep) = &record
                && !edges.insert((dep.from_ticket_id.clone(), dep.to_ticket_id.clone(), dep.kind))
            {
                return Err(Error::DuplicateEdgeRecord {
                    line_number,
                    from: dep.from_ticket_id.clone(),
                    to: dep.to_ticket_id.clone(),
                    kind: dep.kind,
                });
            }
            contents.push(record);
        }

        debug!(
            tickets = contents.tickets.len(),
            comments = contents.comments.len(),
            dependencies = contents.dependencies.len(),
            "read log"
        );
        Ok(contents)
    }

    /// Sorts `contents` and atomically replaces the log with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written. The previous log is
    /// left intact on failure.
    pub fn write_all(&self, contents: &mut LogContents) -> Result<()> {
        contents.sort();
        write_atomic_with(&self.path, |writer| {
            writer.write_all(&contents.tickets)?;
            writer.write_all(&contents.comments)?;
            writer.write_all(&contents.dependencies)
        })?;

        trace!(path = %self.path.display(), records = contents.len(), "rewrote log");
        Ok(())
    }

    /// Adds one record.
    ///
    /// The log is read, extended and rewritten in canonical order, so the
    /// result is identical to a full [`write_all`](Self::write_all).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTicket`] or [`Error::DuplicateId`] if the ID
    /// is already present, otherwise any read or write error.
    pub fn append(&self, record: Record) -> Result<()> {
        let mut contents = self.read_all()?;
        if contents.contains_id(record.id()) {
            return Err(match record {
                Record::Ticket(t) => Error::DuplicateTicket(t.id),
                other => Error::DuplicateId(other.id().to_string()),
            });
        }
        contents.push(record);
        self.write_all(&mut contents)
    }

    /// Replaces the ticket with the same ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if the log holds no such ticket.
    pub fn replace_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut contents = self.read_all()?;
        let slot = contents
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket.id)
            .ok_or_else(|| Error::TicketNotFound(ticket.id.clone()))?;
        slot.clone_from(ticket);
        self.write_all(&mut contents)
    }

    /// Returns the current fingerprint of the log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but its metadata cannot be read.
    pub fn fingerprint(&self) -> Result<LogFingerprint> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogFingerprint::default()),
            Err(e) => return Err(e.into()),
        };

        let modified_ns = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Ok(LogFingerprint {
            modified_ns,
            len: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CommentId, DependencyId, DependencyKind, NewTicket, TicketId, ValidationError,
    };
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn ticket(id: &str) -> Ticket {
        Ticket::new(TicketId::new(id), NewTicket::new(format!("ticket {id}")), at(0)).unwrap()
    }

    fn comment(id: &str, ticket: &str) -> Comment {
        Comment::new(CommentId::new(id), TicketId::new(ticket), "note", at(1)).unwrap()
    }

    fn dependency(id: &str, from: &str, to: &str) -> Dependency {
        Dependency::new(
            DependencyId::new(id),
            TicketId::new(from),
            TicketId::new(to),
            DependencyKind::BlockedBy,
            at(2),
        )
        .unwrap()
    }

    fn store() -> (TempDir, LogStore) {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("tickets.jsonl"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, store) = store();
        assert!(store.read_all().unwrap().is_empty());
        assert_eq!(store.fingerprint().unwrap(), LogFingerprint::default());
    }

    #[test]
    fn write_all_orders_groups_and_ids() {
        let (_dir, store) = store();
        let mut contents = LogContents {
            tickets: vec![ticket("TH-bbbbbb"), ticket("TH-aaaaaa")],
            comments: vec![comment("TH-c000002", "TH-aaaaaa"), comment("TH-c000001", "TH-bbbbbb")],
            dependencies: vec![dependency("TH-d000001", "TH-bbbbbb", "TH-aaaaaa")],
        };
        store.write_all(&mut contents).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let ids: Vec<String> = text
            .lines()
            .map(|l| {
                let value: serde_json::Value = serde_json::from_str(l).unwrap();
                value["id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            ids,
            ["TH-aaaaaa", "TH-bbbbbb", "TH-c000001", "TH-c000002", "TH-d000001"]
        );

        assert_eq!(store.read_all().unwrap(), contents);
    }

    #[test]
    fn append_matches_full_rewrite() {
        let (_dir, appended) = store();
        appended.append(ticket("TH-zzzzzz").into()).unwrap();
        appended.append(dependency("TH-d000001", "TH-zzzzzz", "TH-aaaaaa").into()).unwrap();
        appended.append(ticket("TH-aaaaaa").into()).unwrap();

        let (_dir2, rewritten) = store();
        rewritten
            .write_all(&mut LogContents {
                tickets: vec![ticket("TH-aaaaaa"), ticket("TH-zzzzzz")],
                comments: vec![],
                dependencies: vec![dependency("TH-d000001", "TH-zzzzzz", "TH-aaaaaa")],
            })
            .unwrap();

        assert_eq!(
            fs::read(appended.path()).unwrap(),
            fs::read(rewritten.path()).unwrap()
        );
    }

    #[test]
    fn append_rejects_existing_ids() {
        let (_dir, store) = store();
        store.append(ticket("TH-aaaaaa").into()).unwrap();

        let err = store.append(ticket("TH-aaaaaa").into()).unwrap_err();
        assert!(matches!(err, Error::DuplicateTicket(id) if id.as_str() == "TH-aaaaaa"));
    }

    #[test]
    fn replace_ticket_swaps_in_place() {
        let (_dir, store) = store();
        store.append(ticket("TH-aaaaaa").into()).unwrap();

        let mut changed = ticket("TH-aaaaaa");
        changed.close(at(100));
        store.replace_ticket(&changed).unwrap();

        assert_eq!(store.read_all().unwrap().tickets, [changed]);
    }

    #[test]
    fn replace_missing_ticket_fails() {
        let (_dir, store) = store();
        let err = store.replace_ticket(&ticket("TH-aaaaaa")).unwrap_err();
        assert!(matches!(err, Error::TicketNotFound(_)));
    }

    #[test]
    fn malformed_line_aborts_with_line_number() {
        let (_dir, store) = store();
        store.append(ticket("TH-aaaaaa").into()).unwrap();
        let mut text = fs::read_to_string(store.path()).unwrap();
        text.push_str("\n{\"id\": \"TH-bbbbbb\", \"title\": \n");
        fs::write(store.path(), text).unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(&err, Error::Log(e) if e.line_number() == Some(3)));
    }

    #[test]
    fn invalid_record_aborts_with_line_number() {
        let (_dir, store) = store();
        let mut bad = ticket("TH-aaaaaa");
        bad.title = " ".to_string();
        let line = serde_json::to_string(&bad).unwrap();
        fs::write(store.path(), format!("{line}\n")).unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRecord { line_number: 1, source: ValidationError::EmptyTitle }
        ));
    }

    #[test]
    fn repeated_id_aborts_read() {
        let (_dir, store) = store();
        let line = serde_json::to_string(&ticket("TH-aaaaaa")).unwrap();
        fs::write(store.path(), format!("{line}\n{line}\n")).unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord { line_number: 2, .. }));
    }

    #[test]
    fn repeated_edge_under_new_id_aborts_read() {
        let (_dir, store) = store();
        let first = dependency("TH-d000001", "TH-bbbbbb", "TH-aaaaaa");
        let second = dependency("TH-d000002", "TH-bbbbbb", "TH-aaaaaa");
        let first = serde_json::to_string(&first).unwrap();
        let second = serde_json::to_string(&second).unwrap();
        fs::write(store.path(), format!("{first}\n{second}\n")).unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateEdgeRecord { line_number: 2, kind: DependencyKind::BlockedBy, .. }
        ));
        assert!(!err.is_cache_error());
    }

    #[test]
    fn fingerprint_tracks_length() {
        let (_dir, store) = store();
        store.append(ticket("TH-aaaaaa").into()).unwrap();
        let first = store.fingerprint().unwrap();
        assert!(first.len > 0);

        store.append(ticket("TH-bbbbbb").into()).unwrap();
        assert_ne!(store.fingerprint().unwrap(), first);
    }

    #[test]
    fn fingerprint_round_trips_through_text() {
        let fingerprint = LogFingerprint {
            modified_ns: 1_700_000_000_123_456_789,
            len: 42,
        };
        assert_eq!(fingerprint.to_string(), "1700000000123456789:42");
        assert_eq!(fingerprint.to_string().parse::<LogFingerprint>().unwrap(), fingerprint);
        assert!("garbage".parse::<LogFingerprint>().is_err());
    }
}
