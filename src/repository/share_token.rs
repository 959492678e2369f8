//! Share tokens with their parent note.

use rusqlite::Row;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::note::read_note;
use crate::db::{ReadScope, optional_timestamp_column, timestamp_column};
use crate::error::QueryError;
use crate::query::{Entity, EntitySchema, FetchPlan, Identifier, Page, PageRequest, PagedQuery, Predicate};
use crate::{NoteId, ShareToken, ShareTokenId};

pub static SHARE_TOKEN_SCHEMA: EntitySchema = EntitySchema {
    name: "share_token",
    table: "share_tokens",
    alias: "s",
    identifier: Identifier::Single("id"),
    sortable: &[
        ("id", "id"),
        ("createdAt", "created_at"),
        ("expiresAt", "expires_at"),
    ],
};

impl Entity for ShareToken {
    type Id = ShareTokenId;

    fn schema() -> &'static EntitySchema {
        &SHARE_TOKEN_SCHEMA
    }

    fn id(&self) -> ShareTokenId {
        ShareToken::id(self)
    }
}

/// Loads each token joined to its note. The join is many-to-one, so there is
/// exactly one row per token.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShareTokenFetchPlan;

impl FetchPlan<ShareToken> for ShareTokenFetchPlan {
    fn select_list(&self) -> &str {
        concat!(
            "s.token AS share_token, s.owner AS share_owner, \
             s.created_at AS share_created_at, s.expires_at AS share_expires_at, ",
            note_columns!()
        )
    }

    fn from_clause(&self) -> &str {
        "share_tokens s JOIN notes n ON n.id = s.note_id"
    }

    fn read_entity(&self, row: &Row<'_>) -> rusqlite::Result<ShareToken> {
        Ok(ShareToken::new(
            row.get("hydrated_id")?,
            row.get::<_, String>("share_token")?,
            row.get::<_, String>("share_owner")?,
            timestamp_column(row, "share_created_at")?,
            optional_timestamp_column(row, "share_expires_at")?,
            read_note(row)?,
        ))
    }
}

/// Filter vocabulary for share tokens. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareTokenFilter {
    pub owner: Option<String>,
    /// Only tokens for this note.
    pub note: Option<NoteId>,
    /// Case-insensitive substring of the token or the shared note's title.
    pub search: Option<String>,
    /// Only tokens still valid at this instant.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub active_at: Option<OffsetDateTime>,
}

impl ShareTokenFilter {
    pub fn to_predicate(&self) -> Predicate<ShareToken> {
        Predicate::all_of(
            [
                self.owner.as_deref().map(predicates::owned_by),
                self.note.map(predicates::for_note),
                self.search.as_deref().map(predicates::text_search),
                self.active_at.map(predicates::active_at),
            ]
            .into_iter()
            .flatten(),
        )
    }
}

pub mod predicates {
    use rusqlite::types::Value;
    use time::OffsetDateTime;

    use crate::db::FOLD_CASE;
    use crate::query::{Condition, Predicate, contains_pattern};
    use crate::{NoteId, ShareToken, ShareTokenId};

    pub fn has_id(id: ShareTokenId) -> Predicate<ShareToken> {
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("id")),
                vec![Value::Integer(id.get())],
            )
        })
    }

    pub fn owned_by(owner: &str) -> Predicate<ShareToken> {
        let owner = owner.to_string();
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("owner")),
                vec![Value::Text(owner.clone())],
            )
        })
    }

    pub fn for_note(note: NoteId) -> Predicate<ShareToken> {
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("note_id")),
                vec![Value::Integer(note.get())],
            )
        })
    }

    /// Blank text matches everything.
    pub fn text_search(text: &str) -> Predicate<ShareToken> {
        let text = text.trim();
        if text.is_empty() {
            return Predicate::all();
        }
        let pattern = contains_pattern(&text.to_lowercase());
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!(
                    "({fold}({token}) LIKE ? ESCAPE '\\'
                      OR EXISTS (SELECT 1 FROM notes sn WHERE sn.id = {note}
                                 AND {fold}(sn.title) LIKE ? ESCAPE '\\'))",
                    fold = FOLD_CASE,
                    token = schema.column("token"),
                    note = schema.column("note_id"),
                ),
                vec![Value::Text(pattern.clone()), Value::Text(pattern.clone())],
            )
        })
    }

    pub fn active_at(at: OffsetDateTime) -> Predicate<ShareToken> {
        let at = at.unix_timestamp();
        Predicate::from_fn(move |schema| {
            let expires = schema.column("expires_at");
            Condition::new(
                format!("({expires} IS NULL OR {expires} > ?)"),
                vec![Value::Integer(at)],
            )
        })
    }
}

/// Paged access to share tokens and their notes.
#[derive(Debug)]
pub struct ShareTokenRepository {
    query: PagedQuery<ShareToken, ShareTokenFetchPlan>,
}

impl ShareTokenRepository {
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            query: PagedQuery::new(ShareTokenFetchPlan)?,
        })
    }

    pub fn find_page(
        &self,
        scope: &ReadScope<'_>,
        filter: &ShareTokenFilter,
        request: &PageRequest,
    ) -> Result<Page<ShareToken>, QueryError> {
        self.query.find_page(scope, &filter.to_predicate(), request)
    }

    pub fn find_by_id(
        &self,
        scope: &ReadScope<'_>,
        id: ShareTokenId,
    ) -> Result<Option<ShareToken>, QueryError> {
        let page = self
            .query
            .find_page(scope, &predicates::has_id(id), &PageRequest::of(0, 1)?)?;
        Ok(page.into_content().into_iter().next())
    }

    pub fn count(&self, scope: &ReadScope<'_>, filter: &ShareTokenFilter) -> Result<u64, QueryError> {
        self.query.count(scope, &filter.to_predicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::query::Sort;
    use crate::repository::fixtures::{insert_note, tag_note};

    fn insert_token(
        db: &Database,
        token: &str,
        note: NoteId,
        owner: &str,
        created_at: i64,
        expires_at: Option<i64>,
    ) {
        db.connection()
            .execute(
                "INSERT INTO share_tokens (token, note_id, owner, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![token, note, owner, created_at, expires_at],
            )
            .unwrap();
    }

    fn seeded() -> (Database, NoteId, NoteId) {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let plans = insert_note(conn, "alice", "Travel plans", "Lisbon", None, false, 10);
        tag_note(conn, plans, &["travel", "summer"]);
        let recipe = insert_note(conn, "alice", "Recipe", "Bread", None, false, 20);

        insert_token(&db, "tok-aaa", plans, "alice", 100, None);
        insert_token(&db, "tok-bbb", plans, "alice", 200, Some(1_000));
        insert_token(&db, "tok-ccc", recipe, "alice", 300, Some(5_000));
        insert_token(&db, "tok-ddd", recipe, "bob", 400, None);
        (db, plans, recipe)
    }

    fn tokens(db: &Database, filter: ShareTokenFilter) -> Vec<String> {
        let repo = ShareTokenRepository::new().unwrap();
        let scope = db.read_scope().unwrap();
        repo.find_page(
            &scope,
            &filter,
            &PageRequest::unpaged().with_sort(Sort::asc("createdAt")),
        )
        .unwrap()
        .content()
        .iter()
        .map(|t| t.token().to_string())
        .collect()
    }

    #[test]
    fn hydrates_parent_note() {
        let (db, plans, _) = seeded();
        let repo = ShareTokenRepository::new().unwrap();
        let scope = db.read_scope().unwrap();

        let token = repo
            .find_by_id(&scope, ShareTokenId::new(2))
            .unwrap()
            .unwrap();

        assert_eq!(token.token(), "tok-bbb");
        assert_eq!(token.note().id(), plans);
        assert_eq!(token.note().title(), "Travel plans");
        assert_eq!(token.expires_at().map(|t| t.unix_timestamp()), Some(1_000));
        assert!(token.note().tags().is_empty());
    }

    #[test]
    fn filters_by_owner_and_note() {
        let (db, _, recipe) = seeded();

        let filter = ShareTokenFilter {
            owner: Some("alice".into()),
            note: Some(recipe),
            ..ShareTokenFilter::default()
        };
        assert_eq!(tokens(&db, filter), vec!["tok-ccc"]);
    }

    #[test]
    fn search_matches_token_or_note_title() {
        let (db, _, _) = seeded();

        let by_title = ShareTokenFilter {
            search: Some("travel".into()),
            ..ShareTokenFilter::default()
        };
        assert_eq!(tokens(&db, by_title), vec!["tok-aaa", "tok-bbb"]);

        let by_token = ShareTokenFilter {
            search: Some("DDD".into()),
            ..ShareTokenFilter::default()
        };
        assert_eq!(tokens(&db, by_token), vec!["tok-ddd"]);
    }

    #[test]
    fn active_at_excludes_expired_tokens() {
        let (db, _, _) = seeded();

        let filter = ShareTokenFilter {
            active_at: Some(OffsetDateTime::from_unix_timestamp(2_000).unwrap()),
            ..ShareTokenFilter::default()
        };
        assert_eq!(tokens(&db, filter), vec!["tok-aaa", "tok-ccc", "tok-ddd"]);
    }

    #[test]
    fn pages_tokens_with_independent_total() {
        let (db, _, _) = seeded();
        let repo = ShareTokenRepository::new().unwrap();
        let scope = db.read_scope().unwrap();
        let filter = ShareTokenFilter::default();

        let request = PageRequest::of(1, 3)
            .unwrap()
            .with_sort(Sort::desc("createdAt"));
        let page = repo.find_page(&scope, &filter, &request).unwrap();

        assert_eq!(page.content()[0].token(), "tok-aaa");
        assert_eq!(page.number_of_elements(), 1);
        assert_eq!(page.total_elements(), 4);
        assert_eq!(repo.count(&scope, &filter).unwrap(), 4);
    }
}
