//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use thicket::{
    Comment, CommentId, Dependency, DependencyId, DependencyKind, NewTicket, ProjectCode, Store,
    StorePaths, Ticket, TicketId, config,
};
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thicket=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// The project code every test uses.
pub fn project() -> ProjectCode {
    ProjectCode::new("TH").expect("TH is a valid project code")
}

/// Create an initialized data directory without opening a store.
pub fn temp_project() -> (TempDir, StorePaths) {
    init_tracing();
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let paths = StorePaths::for_project_root(dir.path());
    config::init(&paths, project()).expect("failed to init data directory");
    (dir, paths)
}

/// Create an initialized data directory and open a store on it.
pub fn temp_store() -> (TempDir, StorePaths, Store) {
    let (dir, paths) = temp_project();
    let store = Store::open(&paths).expect("failed to open store");
    (dir, paths, store)
}

/// A fixed point in time, `secs` seconds after a fixed epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp in range")
}

pub fn ticket(id: &str, priority: i32, created: i64) -> Ticket {
    let mut new = NewTicket::new(format!("ticket {id}"));
    new.priority = priority;
    Ticket::new(TicketId::new(id), new, at(created)).expect("valid ticket")
}

pub fn comment(id: &str, ticket: &str, content: &str, created: i64) -> Comment {
    Comment::new(CommentId::new(id), TicketId::new(ticket), content, at(created))
        .expect("valid comment")
}

pub fn dependency(id: &str, from: &str, to: &str, kind: DependencyKind) -> Dependency {
    Dependency::new(
        DependencyId::new(id),
        TicketId::new(from),
        TicketId::new(to),
        kind,
        at(0),
    )
    .expect("valid dependency")
}

pub fn ids(tickets: &[Ticket]) -> Vec<&str> {
    tickets.iter().map(|t| t.id.as_str()).collect()
}
