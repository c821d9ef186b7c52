//! Database schema definition for the ticket cache.

/// Bumped whenever [`SCHEMA`] changes incompatibly. Stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- One row per ticket; labels live in ticket_labels
CREATE TABLE IF NOT EXISTS tickets (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    type TEXT,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL,
    assignee TEXT,
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
CREATE INDEX IF NOT EXISTS idx_tickets_priority ON tickets(priority);

-- position preserves label order
CREATE TABLE IF NOT EXISTS ticket_labels (
    ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (ticket_id, label)
);

CREATE INDEX IF NOT EXISTS idx_ticket_labels_label ON ticket_labels(label);

-- ticket_id is a soft reference: comments may name tickets that do not exist
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    ticket_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_ticket ON comments(ticket_id);

CREATE TABLE IF NOT EXISTS dependencies (
    id TEXT PRIMARY KEY,
    from_ticket_id TEXT NOT NULL,
    to_ticket_id TEXT NOT NULL,
    type TEXT NOT NULL,
    created TEXT NOT NULL,
    UNIQUE (from_ticket_id, to_ticket_id, type)
);

CREATE INDEX IF NOT EXISTS idx_dependencies_from ON dependencies(from_ticket_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_to ON dependencies(to_ticket_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_type ON dependencies(type);

-- Key-value store; holds the log checkpoint
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Drops every table so [`SCHEMA`] can be applied fresh.
pub(crate) const DROP_SCHEMA: &str = r"
DROP TABLE IF EXISTS ticket_labels;
DROP TABLE IF EXISTS tickets;
DROP TABLE IF EXISTS comments;
DROP TABLE IF EXISTS dependencies;
DROP TABLE IF EXISTS metadata;
";
