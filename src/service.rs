use std::collections::BTreeSet;

use rusqlite::OptionalExtension;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DEFAULT_MAX_PAGE_SIZE;
use crate::error::{QueryError, ServiceError};
use crate::query::{Direction, Page, PageRequest, Sort};
use crate::repository::{NoteFilter, NoteRepository, ShareTokenFilter, ShareTokenRepository};
use crate::{Database, Note, NoteId, ShareToken, ShareTokenId, Tag};

/// Input for [`NoteService::create_note`].
///
/// # Examples
///
/// ```
/// use jotter::NewNote;
///
/// let note = NewNote::new("alice", "Reading list", "SICP, TAPL")
///     .tags(["books", "cs"])
///     .color("blue")
///     .pinned(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNote {
    pub owner: String,
    pub title: String,
    pub content: String,
    pub color: Option<String>,
    pub pinned: bool,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn new(owner: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Service layer providing note management operations.
///
/// NoteService owns a Database instance and provides high-level business logic
/// for notes, tags and share tokens. Listing goes through the paged
/// repositories, each call inside its own read scope.
///
/// # Examples
///
/// ```
/// use jotter::{Database, NewNote, NoteFilter, NoteService};
/// use jotter::query::PageRequest;
///
/// # fn main() -> anyhow::Result<()> {
/// let service = NoteService::new(Database::in_memory()?)?;
/// service.create_note(NewNote::new("alice", "First", "hello").tags(["intro"]))?;
///
/// let page = service.list_notes(&NoteFilter::owned_by("alice"), PageRequest::of(0, 10)?)?;
/// assert_eq!(page.total_elements(), 1);
/// assert_eq!(page.content()[0].tag_names(), vec!["intro"]);
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    db: Database,
    notes: NoteRepository,
    share_tokens: ShareTokenRepository,
    max_page_size: usize,
}

impl NoteService {
    /// Creates a new NoteService with the given database.
    pub fn new(db: Database) -> Result<Self, ServiceError> {
        Ok(Self {
            db,
            notes: NoteRepository::new()?,
            share_tokens: ShareTokenRepository::new()?,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        })
    }

    /// Sets the largest page size a listing will return. Values below 1 are treated as 1.
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates a note and its tags in one transaction.
    ///
    /// Tag names are normalized (trimmed, lowercased), deduplicated and created
    /// on demand. Blank tag names are skipped.
    pub fn create_note(&self, new_note: NewNote) -> Result<Note, ServiceError> {
        if new_note.owner.trim().is_empty() {
            return Err(ServiceError::Validation("Note owner cannot be empty".into()));
        }
        if new_note.title.trim().is_empty() {
            return Err(ServiceError::Validation("Note title cannot be empty".into()));
        }

        let conn = self.db.connection();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let color = new_note
            .color
            .as_deref()
            .map(str::trim)
            .filter(|color| !color.is_empty());
        let tag_names: BTreeSet<String> = new_note
            .tags
            .iter()
            .filter_map(|name| Tag::normalize_name(name))
            .collect();

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notes (owner, title, content, color, pinned, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                new_note.owner.trim(),
                new_note.title.trim(),
                new_note.content,
                color,
                new_note.pinned,
                now,
            ],
        )?;
        let note_id = NoteId::new(tx.last_insert_rowid());

        for name in &tag_names {
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
            let tag_id: i64 =
                tx.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))?;
            tx.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
                rusqlite::params![note_id, tag_id],
            )?;
        }
        tx.commit()?;

        info!(
            subsystem = "service",
            op = "create_note",
            note_id = note_id.get(),
            tag_count = tag_names.len(),
            "Note created"
        );
        self.get_note(note_id)?
            .ok_or(ServiceError::NoteNotFound(note_id))
    }

    /// Retrieves a note with its tags by ID.
    ///
    /// Returns `None` if no note exists with the given ID.
    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>, ServiceError> {
        let scope = self.db.read_scope()?;
        let note = self.notes.find_by_id(&scope, id)?;
        scope.finish()?;
        Ok(note)
    }

    /// Deletes a note by its ID, along with its tag links and share tokens.
    ///
    /// This operation is idempotent: deleting a non-existent note succeeds.
    pub fn delete_note(&self, id: NoteId) -> Result<(), ServiceError> {
        let deleted = self
            .db
            .connection()
            .execute("DELETE FROM notes WHERE id = ?1", [id])?;
        debug!(subsystem = "service", op = "delete_note", note_id = id.get(), deleted, "Note delete");
        Ok(())
    }

    /// Pins or unpins a note, bumping its update time.
    pub fn set_pinned(&self, id: NoteId, pinned: bool) -> Result<(), ServiceError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let updated = self.db.connection().execute(
            "UPDATE notes SET pinned = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![pinned, now, id],
        )?;
        if updated == 0 {
            return Err(ServiceError::NoteNotFound(id));
        }
        Ok(())
    }

    /// Lists one page of notes.
    ///
    /// Unsorted requests are ordered pinned-first, then most recently updated.
    /// Every request gets an `id` tiebreaker so paging is stable, and page
    /// sizes above the service maximum are clamped.
    pub fn list_notes(
        &self,
        filter: &NoteFilter,
        request: PageRequest,
    ) -> Result<Page<Note>, ServiceError> {
        let default_sort = Sort::desc("pinned").then("updatedAt", Direction::Desc);
        let request = normalize_request(request, default_sort, self.max_page_size)?;

        let scope = self.db.read_scope()?;
        let page = self.notes.find_page(&scope, filter, &request)?;
        scope.finish()?;
        Ok(page)
    }

    /// Creates a share token for a note. With a `ttl` the token expires that long from now.
    pub fn create_share_token(
        &self,
        note_id: NoteId,
        owner: &str,
        ttl: Option<Duration>,
    ) -> Result<ShareToken, ServiceError> {
        if owner.trim().is_empty() {
            return Err(ServiceError::Validation("Share token owner cannot be empty".into()));
        }
        if ttl.is_some_and(|ttl| !ttl.is_positive()) {
            return Err(ServiceError::Validation("Share token lifetime must be positive".into()));
        }

        let conn = self.db.connection();
        let note_exists = conn
            .query_row("SELECT 1 FROM notes WHERE id = ?1", [note_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !note_exists {
            return Err(ServiceError::NoteNotFound(note_id));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = ttl
            .map(|ttl| {
                now.checked_add(ttl)
                    .map(OffsetDateTime::unix_timestamp)
                    .ok_or_else(|| ServiceError::Validation("Share token lifetime is too long".into()))
            })
            .transpose()?;
        let token = Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO share_tokens (token, note_id, owner, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![token, note_id, owner.trim(), now.unix_timestamp(), expires_at],
        )?;
        let id = ShareTokenId::new(conn.last_insert_rowid());
        info!(subsystem = "service", op = "create_share_token", note_id = note_id.get(), "Share token created");

        let scope = self.db.read_scope()?;
        let created = self.share_tokens.find_by_id(&scope, id)?;
        scope.finish()?;
        created.ok_or(ServiceError::NoteNotFound(note_id))
    }

    /// Revokes a share token. Returns whether a token was removed.
    pub fn revoke_share_token(&self, token: &str) -> Result<bool, ServiceError> {
        let removed = self
            .db
            .connection()
            .execute("DELETE FROM share_tokens WHERE token = ?1", [token])?;
        Ok(removed > 0)
    }

    /// Lists one page of share tokens with their notes, newest first unless sorted otherwise.
    pub fn list_share_tokens(
        &self,
        filter: &ShareTokenFilter,
        request: PageRequest,
    ) -> Result<Page<ShareToken>, ServiceError> {
        let request = normalize_request(request, Sort::desc("createdAt"), self.max_page_size)?;

        let scope = self.db.read_scope()?;
        let page = self.share_tokens.find_page(&scope, filter, &request)?;
        scope.finish()?;
        Ok(page)
    }
}

/// Applies listing defaults to a caller's page request.
///
/// - an unsorted request takes `default_sort`
/// - an `id` key is appended unless present, following the last key's direction
/// - a paged request larger than `max_page_size` is clamped
fn normalize_request(
    request: PageRequest,
    default_sort: Sort,
    max_page_size: usize,
) -> Result<PageRequest, QueryError> {
    let mut sort = if request.sort().is_unsorted() {
        default_sort
    } else {
        request.sort().clone()
    };
    if !sort.contains("id") {
        let direction = sort.keys().last().map(|key| key.direction).unwrap_or_default();
        sort = sort.then("id", direction);
    }

    let request = match request.page_size() {
        Some(size) if size > max_page_size => PageRequest::of(request.page_index(), max_page_size)?,
        _ => request,
    };
    Ok(request.with_sort(sort))
}
