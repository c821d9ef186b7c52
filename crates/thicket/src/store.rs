//! The store: keeps the cache in step with the log.
//!
//! The log is the source of truth and the cache is disposable. Every
//! mutation is validated against the cache, written to the log, then
//! mirrored into the cache. Reads go to the cache only.
//!
//! # Staleness
//!
//! The cache records the [`LogFingerprint`] it was built from. When the log's
//! current fingerprint differs (another process or a `git pull` rewrote it),
//! the cache is rebuilt from scratch. Mutations check this first so their
//! validation sees the current log; plain queries do not, so callers that
//! watch the file call [`Store::sync`] themselves.
//!
//! # Partial failure
//!
//! A mutation that fails before the log write changes nothing. Once the log
//! is written the mutation is durable: if the cache cannot be updated the
//! store rebuilds it from the log, and if that fails too the checkpoint is
//! cleared and [`Error::CacheSync`] is returned. The next open rebuilds.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cache::{Cache, CacheStats};
use crate::codec::Record;
use crate::config::StorePaths;
use crate::domain::{
    Comment, Dependency, DependencyKind, NewTicket, ProjectCode, Ticket, TicketFilter, TicketId,
    TicketUpdate,
};
use crate::error::{Error, Result};
use crate::graph::check_new_edge;
use crate::id_generation::IdGenerator;
use crate::log_store::{LogFingerprint, LogStore};

/// What [`Store::sync`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache already matched the log.
    Fresh,
    /// The cache was rebuilt from the log.
    Rebuilt,
}

/// A ticket store backed by a log file and a cache database.
pub struct Store {
    paths: StorePaths,
    log: LogStore,
    cache: Cache,
}

impl Store {
    /// Open the store in an initialized data directory.
    ///
    /// The cache is created if missing and rebuilt if stale. A cache that
    /// cannot be used at all (corrupt file, broken schema) is deleted and
    /// recreated once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the data directory does not exist,
    /// any error reading the log, or a cache error that persists after the
    /// cache has been recreated.
    pub fn open(paths: &StorePaths) -> Result<Self> {
        if !paths.is_initialized() {
            return Err(Error::NotInitialized(paths.dir().to_path_buf()));
        }

        match Self::open_and_sync(paths) {
            Ok(store) => Ok(store),
            Err(e) if e.is_cache_error() => {
                warn!(
                    path = %paths.cache().display(),
                    error = %e,
                    "Cache unusable, recreating it from the log"
                );
                Cache::remove_files(paths.cache())?;
                Self::open_and_sync(paths)
            }
            Err(e) => Err(e),
        }
    }

    fn open_and_sync(paths: &StorePaths) -> Result<Self> {
        let mut store = Self {
            paths: paths.clone(),
            log: LogStore::new(paths.log()),
            cache: Cache::open(paths.cache())?,
        };
        store.sync()?;
        Ok(store)
    }

    /// The paths this store was opened with.
    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Rebuild the cache if the log changed since it was last built.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or the cache not rebuilt.
    pub fn sync(&mut self) -> Result<SyncOutcome> {
        let current = self.log.fingerprint()?;
        let checkpoint = self.cache.checkpoint()?;

        if checkpoint == Some(current) {
            debug!(%current, "Cache is fresh");
            return Ok(SyncOutcome::Fresh);
        }

        debug!(
            checkpoint = ?checkpoint,
            %current,
            "Log changed since cache was built"
        );
        self.rebuild_from(current)?;
        Ok(SyncOutcome::Rebuilt)
    }

    /// Rebuild the cache from the log unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or the cache not rebuilt.
    pub fn rebuild(&mut self) -> Result<()> {
        let current = self.log.fingerprint()?;
        self.rebuild_from(current)
    }

    // The fingerprint is taken before reading, so a write racing the read
    // leaves the checkpoint behind and the next sync rebuilds again.
    fn rebuild_from(&mut self, fingerprint: LogFingerprint) -> Result<()> {
        let contents = self.log.read_all()?;
        self.cache.rebuild(&contents, fingerprint)
    }

    /// Apply one mutation: write the log, then mirror it into the cache.
    fn commit<W, M>(&mut self, write_log: W, mirror: M) -> Result<()>
    where
        W: FnOnce(&LogStore) -> Result<()>,
        M: FnOnce(&mut Cache) -> Result<()>,
    {
        write_log(&self.log)?;

        let Err(mirror_error) = self.mirror(mirror) else {
            return Ok(());
        };
        warn!(error = %mirror_error, "Cache update failed, rebuilding from log");

        if let Err(rebuild_error) = self.rebuild() {
            error!(
                error = %rebuild_error,
                "Cache rebuild failed; change is saved in the log"
            );
            if let Err(e) = self.cache.clear_checkpoint() {
                warn!(error = %e, "Failed to clear cache checkpoint");
            }
            return Err(Error::CacheSync {
                source: Box::new(rebuild_error),
            });
        }
        Ok(())
    }

    fn mirror<M>(&mut self, mirror: M) -> Result<()>
    where
        M: FnOnce(&mut Cache) -> Result<()>,
    {
        mirror(&mut self.cache)?;
        let fingerprint = self.log.fingerprint()?;
        self.cache.set_checkpoint(fingerprint)
    }

    /// Add a ticket.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`Error::DuplicateTicket`] if the ID is
    /// taken, or a write error.
    pub fn add_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.sync()?;
        ticket.validate()?;
        if self.cache.ticket_exists(&ticket.id)? {
            return Err(Error::DuplicateTicket(ticket.id.clone()));
        }

        self.commit(
            |log| log.append(Record::Ticket(ticket.clone())),
            |cache| cache.insert_ticket(ticket),
        )?;
        debug!(id = %ticket.id, "Added ticket");
        Ok(())
    }

    /// Replace a ticket with a new version.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`Error::TicketNotFound`], or a write error.
    pub fn update_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.sync()?;
        ticket.validate()?;
        if !self.cache.ticket_exists(&ticket.id)? {
            return Err(Error::TicketNotFound(ticket.id.clone()));
        }

        self.commit(
            |log| log.replace_ticket(ticket),
            |cache| cache.update_ticket(ticket),
        )?;
        debug!(id = %ticket.id, status = %ticket.status, "Updated ticket");
        Ok(())
    }

    /// Apply a partial update to a ticket and return the new version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`], a validation error, or a write error.
    pub fn modify_ticket(&mut self, id: &TicketId, update: TicketUpdate) -> Result<Ticket> {
        self.sync()?;
        let mut ticket = self
            .cache
            .get_ticket(id)?
            .ok_or_else(|| Error::TicketNotFound(id.clone()))?;
        ticket.apply(update, Utc::now())?;
        self.update_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Close a ticket and return the new version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] or a write error.
    pub fn close_ticket(&mut self, id: &TicketId) -> Result<Ticket> {
        self.sync()?;
        let mut ticket = self
            .cache
            .get_ticket(id)?
            .ok_or_else(|| Error::TicketNotFound(id.clone()))?;
        ticket.close(Utc::now());
        self.update_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Add a comment. The ticket it names does not have to exist.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`Error::DuplicateId`], or a write error.
    pub fn add_comment(&mut self, comment: &Comment) -> Result<()> {
        self.sync()?;
        comment.validate()?;

        self.commit(
            |log| log.append(Record::Comment(comment.clone())),
            |cache| cache.insert_comment(comment),
        )?;
        debug!(id = %comment.id, ticket = %comment.ticket_id, "Added comment");
        Ok(())
    }

    /// Add a dependency edge. The tickets it names do not have to exist.
    ///
    /// # Errors
    ///
    /// Returns a validation error (including self-edges),
    /// [`Error::DuplicateDependency`], [`Error::CircularDependency`], or a
    /// write error.
    pub fn add_dependency(&mut self, dependency: &Dependency) -> Result<()> {
        self.sync()?;
        check_new_edge(&self.cache, dependency)?;

        self.commit(
            |log| log.append(Record::Dependency(dependency.clone())),
            |cache| cache.insert_dependency(dependency),
        )?;
        debug!(
            id = %dependency.id,
            from = %dependency.from_ticket_id,
            to = %dependency.to_ticket_id,
            kind = %dependency.kind,
            "Added dependency"
        );
        Ok(())
    }

    /// Create a ticket with a generated ID.
    ///
    /// # Errors
    ///
    /// Returns a validation error, an ID generation error, or a write error.
    pub fn create_ticket(&mut self, project: ProjectCode, new: NewTicket) -> Result<Ticket> {
        self.sync()?;
        let id = self.id_generator(project)?.ticket_id(&new.title)?;
        let ticket = Ticket::new(id, new, Utc::now())?;
        self.add_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Comment on a ticket with a generated comment ID.
    ///
    /// # Errors
    ///
    /// Returns a validation error, an ID generation error, or a write error.
    pub fn comment_on(
        &mut self,
        project: ProjectCode,
        ticket_id: &TicketId,
        content: &str,
    ) -> Result<Comment> {
        self.sync()?;
        let id = self
            .id_generator(project)?
            .comment_id(&format!("{ticket_id}|{content}"))?;
        let comment = Comment::new(id, ticket_id.clone(), content, Utc::now())?;
        self.add_comment(&comment)?;
        Ok(comment)
    }

    /// Link two tickets with a generated dependency ID.
    ///
    /// # Errors
    ///
    /// Same as [`add_dependency`](Self::add_dependency), plus ID generation
    /// errors.
    pub fn link(
        &mut self,
        project: ProjectCode,
        from: &TicketId,
        to: &TicketId,
        kind: DependencyKind,
    ) -> Result<Dependency> {
        self.sync()?;
        let id = self
            .id_generator(project)?
            .dependency_id(&format!("{from}|{to}|{kind}"))?;
        let dependency = Dependency::new(id, from.clone(), to.clone(), kind, Utc::now())?;
        self.add_dependency(&dependency)?;
        Ok(dependency)
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        self.cache.get_ticket(id)
    }

    /// List tickets, most urgent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        self.cache.list_tickets(filter)
    }

    /// Comments on a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn comments(&self, ticket_id: &TicketId) -> Result<Vec<Comment>> {
        self.cache.comments_for_ticket(ticket_id)
    }

    /// Edges leaving a ticket, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn dependencies_from(
        &self,
        ticket_id: &TicketId,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<Dependency>> {
        self.cache.dependencies_from(ticket_id, kind)
    }

    /// Edges arriving at a ticket, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn dependencies_to(
        &self,
        ticket_id: &TicketId,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<Dependency>> {
        self.cache.dependencies_to(ticket_id, kind)
    }

    /// Tickets this ticket is blocked by.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn blockers(&self, ticket_id: &TicketId) -> Result<Vec<Ticket>> {
        self.cache.blockers(ticket_id)
    }

    /// Tickets blocked by this ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn blocking(&self, ticket_id: &TicketId) -> Result<Vec<Ticket>> {
        self.cache.blocking(ticket_id)
    }

    /// The ticket this one was created from.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn created_from(&self, ticket_id: &TicketId) -> Result<Option<Ticket>> {
        self.cache.created_from(ticket_id)
    }

    /// Whether the ticket has an open direct blocker.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn is_blocked(&self, ticket_id: &TicketId) -> Result<bool> {
        self.cache.is_blocked(ticket_id)
    }

    /// Open tickets with no open direct blocker, most urgent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn list_ready(&self) -> Result<Vec<Ticket>> {
        self.cache.list_ready()
    }

    /// The most urgent ready ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn next_ready(&self) -> Result<Option<Ticket>> {
        Ok(self.list_ready()?.into_iter().next())
    }

    /// An ID generator that avoids every ID already in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn id_generator(&self, project: ProjectCode) -> Result<IdGenerator> {
        Ok(IdGenerator::with_existing(project, self.cache.known_ids()?))
    }

    /// Record counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    /// Close the cache connection.
    ///
    /// # Errors
    ///
    /// Returns the error `SQLite` reports on close.
    pub fn close(self) -> Result<()> {
        info!(dir = %self.paths.dir().display(), "Closing store");
        self.cache.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{at, comment, ticket};
    use crate::config::init;
    use crate::domain::ValidationError;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());
        init(&paths, ProjectCode::new("TH").unwrap()).unwrap();
        let store = Store::open(&paths).unwrap();
        (temp, store)
    }

    #[test]
    fn open_uninitialized_fails() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());
        assert!(matches!(Store::open(&paths), Err(Error::NotInitialized(_))));
        assert!(!paths.cache().exists());
    }

    #[test]
    fn second_sync_is_fresh() {
        let (_temp, mut store) = temp_store();
        store.add_ticket(&ticket("TH-aaaaaa", 1, 0)).unwrap();
        assert_eq!(store.sync().unwrap(), SyncOutcome::Fresh);
    }

    #[test]
    fn rejected_ticket_leaves_log_untouched() {
        let (_temp, mut store) = temp_store();
        let mut bad = ticket("TH-aaaaaa", 1, 0);
        bad.title = "   ".to_string();

        assert!(matches!(store.add_ticket(&bad), Err(Error::Validation(_))));
        assert!(store.log.read_all().unwrap().is_empty());
    }

    #[test]
    fn empty_assignee_is_rejected_before_it_reaches_the_cache() {
        let (_temp, mut store) = temp_store();
        let mut t = ticket("TH-aaaaaa", 1, 0);
        t.assignee = Some(String::new());

        let err = store.add_ticket(&t).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::BlankAssignee)));
        assert!(store.log.read_all().unwrap().is_empty());

        t.assignee = None;
        store.add_ticket(&t).unwrap();
        t.assignee = Some(String::new());
        assert!(matches!(store.update_ticket(&t), Err(Error::Validation(_))));

        let before = store.get_ticket(&t.id).unwrap();
        store.rebuild().unwrap();
        assert_eq!(store.get_ticket(&t.id).unwrap(), before);
        assert_eq!(before.unwrap().assignee, None);
    }

    #[test]
    fn duplicate_ticket_is_rejected() {
        let (_temp, mut store) = temp_store();
        let t = ticket("TH-aaaaaa", 1, 0);
        store.add_ticket(&t).unwrap();
        assert!(matches!(store.add_ticket(&t), Err(Error::DuplicateTicket(_))));
    }

    #[test]
    fn mirror_failure_falls_back_to_rebuild() {
        let (_temp, mut store) = temp_store();
        // A row the log doesn't know about makes the cache insert collide.
        store
            .cache
            .insert_comment(&comment("TH-c000001", "TH-aaaaaa", 0))
            .unwrap();

        let c = comment("TH-c000001", "TH-bbbbbb", 3);
        store.add_comment(&c).unwrap();

        assert_eq!(store.cache.get_comment(&c.id).unwrap(), Some(c));
        assert_eq!(store.sync().unwrap(), SyncOutcome::Fresh);
    }

    #[test]
    fn failed_rebuild_reports_cache_sync_and_recovers_on_reopen() {
        let (_temp, mut store) = temp_store();
        store
            .cache
            .connection()
            .execute_batch("DROP TABLE comments")
            .unwrap();

        let c = comment("TH-c000001", "TH-aaaaaa", 0);
        let err = store.add_comment(&c).unwrap_err();
        assert!(matches!(err, Error::CacheSync { .. }));
        assert!(err.is_cache_error());

        // The comment is durable even though the cache lost track of it.
        assert_eq!(store.log.read_all().unwrap().comments, [c.clone()]);
        assert_eq!(store.cache.checkpoint().unwrap(), None);

        let paths = store.paths().clone();
        drop(store);
        let reopened = Store::open(&paths).unwrap();
        assert_eq!(reopened.comments(&c.ticket_id).unwrap(), [c]);
    }

    #[test]
    fn modify_ticket_persists_to_log() {
        let (_temp, mut store) = temp_store();
        store.add_ticket(&ticket("TH-aaaaaa", 1, 0)).unwrap();

        let update = TicketUpdate {
            title: Some("renamed".to_string()),
            add_labels: vec!["ops".to_string()],
            ..TicketUpdate::default()
        };
        let updated = store.modify_ticket(&TicketId::new("TH-aaaaaa"), update).unwrap();

        assert_eq!(updated.title, "renamed");
        assert!(updated.updated > at(0));
        assert_eq!(store.log.read_all().unwrap().tickets, [updated.clone()]);
        assert_eq!(store.get_ticket(&updated.id).unwrap(), Some(updated));
    }

    #[test]
    fn modify_missing_ticket_fails() {
        let (_temp, mut store) = temp_store();
        let err = store
            .modify_ticket(&TicketId::new("TH-zzzzzz"), TicketUpdate::default())
            .unwrap_err();
        assert!(matches!(err, Error::TicketNotFound(_)));
    }

    #[test]
    fn generated_records_use_project_code() {
        let (_temp, mut store) = temp_store();
        let code = ProjectCode::new("TH").unwrap();

        let parent = store.create_ticket(code.clone(), NewTicket::new("parent")).unwrap();
        let child = store.create_ticket(code.clone(), NewTicket::new("child")).unwrap();
        let note = store.comment_on(code.clone(), &parent.id, "looks good").unwrap();
        let edge = store
            .link(code, &child.id, &parent.id, DependencyKind::CreatedFrom)
            .unwrap();

        assert!(parent.id.as_str().starts_with("TH-"));
        assert_ne!(parent.id, child.id);
        assert!(note.id.as_str().starts_with("TH-c"));
        assert!(edge.id.as_str().starts_with("TH-d"));
        assert_eq!(store.created_from(&child.id).unwrap(), Some(parent));
        assert_eq!(
            store.stats().unwrap(),
            CacheStats {
                tickets: 2,
                open_tickets: 2,
                comments: 1,
                dependencies: 1,
            }
        );
    }

    #[test]
    fn comment_ids_must_be_unique() {
        let (_temp, mut store) = temp_store();
        let c = comment("TH-c000001", "TH-aaaaaa", 0);
        store.add_comment(&c).unwrap();

        let again = comment("TH-c000001", "TH-bbbbbb", 1);
        assert!(matches!(store.add_comment(&again), Err(Error::DuplicateId(_))));
    }
}
