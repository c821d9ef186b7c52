//! # Thicket: local ticket storage
//!
//! Tickets, comments and dependency edges live in a JSON Lines log that is
//! meant to be committed alongside the code they describe. A `SQLite` cache
//! next to it answers queries; it can be deleted at any time and is rebuilt
//! from the log on the next open.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thicket::{NewTicket, ProjectCode, Store, StorePaths, config};
//!
//! let paths = StorePaths::for_project_root(".");
//! let project = ProjectCode::new("TH")?;
//! config::init(&paths, project.clone())?;
//!
//! let mut store = Store::open(&paths)?;
//! let ticket = store.create_ticket(project, NewTicket::new("Write the docs"))?;
//!
//! for ready in store.list_ready()? {
//!     println!("{} {}", ready.id, ready.title);
//! }
//! # let _ = ticket;
//! # Ok::<(), thicket::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod id_generation;
pub mod log_store;
pub mod store;

pub use cache::{Cache, CacheStats};
pub use codec::Record;
pub use config::{ProjectConfig, StorePaths};
pub use domain::{
    Comment, CommentId, Dependency, DependencyId, DependencyKind, NewTicket, ProjectCode, Status,
    Ticket, TicketFilter, TicketId, TicketType, TicketUpdate, ValidationError,
};
pub use error::{Error, Result};
pub use log_store::{LogContents, LogFingerprint, LogStore};
pub use store::{Store, SyncOutcome};
