//! Notes with their tags.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::db::{ReadScope, timestamp_column};
use crate::error::QueryError;
use crate::query::{Entity, EntitySchema, FetchPlan, Identifier, Page, PageRequest, PagedQuery, Predicate};
use crate::{Note, NoteBuilder, NoteId, Tag, TagId};

pub static NOTE_SCHEMA: EntitySchema = EntitySchema {
    name: "note",
    table: "notes",
    alias: "n",
    identifier: Identifier::Single("id"),
    sortable: &[
        ("id", "id"),
        ("title", "title"),
        ("createdAt", "created_at"),
        ("updatedAt", "updated_at"),
        ("pinned", "pinned"),
        ("color", "color"),
    ],
};

impl Entity for Note {
    type Id = NoteId;

    fn schema() -> &'static EntitySchema {
        &NOTE_SCHEMA
    }

    fn id(&self) -> NoteId {
        Note::id(self)
    }
}

/// Reads the columns selected by `note_columns!` into a tagless note.
pub(crate) fn read_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(NoteBuilder::new()
        .id(row.get("note_id")?)
        .owner(row.get::<_, String>("note_owner")?)
        .title(row.get::<_, String>("note_title")?)
        .content(row.get::<_, String>("note_content")?)
        .color(row.get("note_color")?)
        .pinned(row.get("note_pinned")?)
        .created_at(timestamp_column(row, "note_created_at")?)
        .updated_at(timestamp_column(row, "note_updated_at")?)
        .build())
}

/// Loads notes with every tag, one row per (note, tag) pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoteFetchPlan;

impl FetchPlan<Note> for NoteFetchPlan {
    fn select_list(&self) -> &str {
        concat!(note_columns!(), ", t.id AS tag_id, t.name AS tag_name")
    }

    fn from_clause(&self) -> &str {
        "notes n
         LEFT JOIN note_tags nt ON nt.note_id = n.id
         LEFT JOIN tags t ON t.id = nt.tag_id"
    }

    fn read_entity(&self, row: &Row<'_>) -> rusqlite::Result<Note> {
        read_note(row)
    }

    fn merge_row(&self, note: &mut Note, row: &Row<'_>) -> rusqlite::Result<()> {
        let tag_id: Option<TagId> = row.get("tag_id")?;
        let tag_name: Option<String> = row.get("tag_name")?;
        if let (Some(id), Some(name)) = (tag_id, tag_name) {
            note.attach_tag(Tag::new(id, name));
        }
        Ok(())
    }
}

/// Filter vocabulary for notes. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFilter {
    pub owner: Option<String>,
    /// Case-insensitive substring of the title or content.
    pub search: Option<String>,
    /// Notes carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    /// Notes carrying every one of these tags.
    pub all_tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub pinned: Option<bool>,
}

impl NoteFilter {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn to_predicate(&self) -> Predicate<Note> {
        Predicate::all_of(
            [
                self.owner.as_deref().map(predicates::owned_by),
                self.search.as_deref().map(predicates::text_search),
                self.tags.as_deref().map(predicates::tagged_with_any),
                self.all_tags.as_deref().map(predicates::tagged_with_all),
                self.color.as_deref().map(predicates::with_color),
                self.pinned.map(predicates::pinned),
            ]
            .into_iter()
            .flatten(),
        )
    }
}

/// Note predicates. Tag constraints are correlated subqueries so they never
/// narrow the tags loaded for a matching note.
pub mod predicates {
    use std::collections::BTreeSet;

    use rusqlite::types::Value;

    use crate::db::FOLD_CASE;
    use crate::query::{Condition, Predicate, contains_pattern};
    use crate::{Note, NoteId, Tag};

    pub fn has_id(id: NoteId) -> Predicate<Note> {
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("id")),
                vec![Value::Integer(id.get())],
            )
        })
    }

    pub fn owned_by(owner: &str) -> Predicate<Note> {
        let owner = owner.to_string();
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("owner")),
                vec![Value::Text(owner.clone())],
            )
        })
    }

    /// Blank text matches everything.
    pub fn text_search(text: &str) -> Predicate<Note> {
        let text = text.trim();
        if text.is_empty() {
            return Predicate::all();
        }
        let pattern = contains_pattern(&text.to_lowercase());
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!(
                    "({fold}({title}) LIKE ? ESCAPE '\\' OR {fold}({content}) LIKE ? ESCAPE '\\')",
                    fold = FOLD_CASE,
                    title = schema.column("title"),
                    content = schema.column("content")
                ),
                vec![Value::Text(pattern.clone()), Value::Text(pattern.clone())],
            )
        })
    }

    /// An empty tag list matches nothing.
    pub fn tagged_with_any<S: AsRef<str>>(names: &[S]) -> Predicate<Note> {
        let names = normalized(names);
        if names.is_empty() {
            return Predicate::none();
        }
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!(
                    "EXISTS (SELECT 1 FROM note_tags fnt JOIN tags ft ON ft.id = fnt.tag_id
                     WHERE fnt.note_id = {} AND ft.name IN ({}))",
                    schema.column("id"),
                    placeholders(names.len())
                ),
                names.iter().cloned().map(Value::Text).collect(),
            )
        })
    }

    /// An empty tag list matches nothing.
    pub fn tagged_with_all<S: AsRef<str>>(names: &[S]) -> Predicate<Note> {
        let names = normalized(names);
        if names.is_empty() {
            return Predicate::none();
        }
        Predicate::from_fn(move |schema| {
            let mut params: Vec<Value> = names.iter().cloned().map(Value::Text).collect();
            params.push(Value::Integer(names.len() as i64));
            Condition::new(
                format!(
                    "(SELECT COUNT(DISTINCT ft.id) FROM note_tags fnt JOIN tags ft ON ft.id = fnt.tag_id
                     WHERE fnt.note_id = {} AND ft.name IN ({})) = ?",
                    schema.column("id"),
                    placeholders(names.len())
                ),
                params,
            )
        })
    }

    pub fn with_color(color: &str) -> Predicate<Note> {
        let color = color.trim().to_string();
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ? COLLATE NOCASE", schema.column("color")),
                vec![Value::Text(color.clone())],
            )
        })
    }

    pub fn pinned(pinned: bool) -> Predicate<Note> {
        Predicate::from_fn(move |schema| {
            Condition::new(
                format!("{} = ?", schema.column("pinned")),
                vec![Value::Integer(i64::from(pinned))],
            )
        })
    }

    fn normalized<S: AsRef<str>>(names: &[S]) -> Vec<String> {
        names
            .iter()
            .filter_map(|name| Tag::normalize_name(name.as_ref()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }
}

/// Paged access to notes and their tags.
#[derive(Debug)]
pub struct NoteRepository {
    query: PagedQuery<Note, NoteFetchPlan>,
}

impl NoteRepository {
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            query: PagedQuery::new(NoteFetchPlan)?,
        })
    }

    pub fn find_page(
        &self,
        scope: &ReadScope<'_>,
        filter: &NoteFilter,
        request: &PageRequest,
    ) -> Result<Page<Note>, QueryError> {
        self.find_matching(scope, &filter.to_predicate(), request)
    }

    /// Like [`Self::find_page`] for predicates outside the [`NoteFilter`] vocabulary.
    pub fn find_matching(
        &self,
        scope: &ReadScope<'_>,
        predicate: &Predicate<Note>,
        request: &PageRequest,
    ) -> Result<Page<Note>, QueryError> {
        self.query.find_page(scope, predicate, request)
    }

    pub fn find_by_id(&self, scope: &ReadScope<'_>, id: NoteId) -> Result<Option<Note>, QueryError> {
        let page = self
            .query
            .find_page(scope, &predicates::has_id(id), &PageRequest::of(0, 1)?)?;
        Ok(page.into_content().into_iter().next())
    }

    pub fn count(&self, scope: &ReadScope<'_>, filter: &NoteFilter) -> Result<u64, QueryError> {
        self.query.count(scope, &filter.to_predicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::query::Sort;
    use crate::repository::fixtures::{insert_note, tag_note};

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        let a = insert_note(conn, "alice", "Rust notes", "ownership rules", Some("red"), true, 100);
        tag_note(conn, a, &["rust", "lang", "systems"]);
        let b = insert_note(conn, "alice", "Groceries", "eggs and 100% cocoa", Some("Green"), false, 200);
        tag_note(conn, b, &["home"]);
        let c = insert_note(conn, "alice", "Borrow checker", "lifetimes", None, false, 300);
        tag_note(conn, c, &["rust"]);
        insert_note(conn, "bob", "Bob's rust", "not alice's", Some("red"), false, 400);

        db
    }

    fn find(db: &Database, filter: NoteFilter) -> Vec<String> {
        let repo = NoteRepository::new().unwrap();
        let scope = db.read_scope().unwrap();
        repo.find_page(
            &scope,
            &filter,
            &PageRequest::unpaged().with_sort(Sort::asc("id")),
        )
        .unwrap()
        .content()
        .iter()
        .map(|note| note.title().to_string())
        .collect()
    }

    #[test]
    fn filters_by_owner() {
        let db = seeded();
        assert_eq!(
            find(&db, NoteFilter::owned_by("alice")),
            vec!["Rust notes", "Groceries", "Borrow checker"]
        );
    }

    #[test]
    fn text_search_is_case_insensitive_over_title_and_content() {
        let db = seeded();

        let filter = NoteFilter {
            search: Some("RUST".into()),
            ..NoteFilter::owned_by("alice")
        };
        assert_eq!(find(&db, filter), vec!["Rust notes"]);

        let filter = NoteFilter {
            search: Some("LIFETIMES".into()),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, filter), vec!["Borrow checker"]);
    }

    #[test]
    fn text_search_folds_non_ascii_case() {
        let db = seeded();
        insert_note(db.connection(), "alice", "Über Rust", "ÇA VA", None, false, 500);

        for needle in ["über", "ÜBER", "ça va"] {
            let filter = NoteFilter {
                search: Some(needle.into()),
                ..NoteFilter::default()
            };
            assert_eq!(find(&db, filter), vec!["Über Rust"], "searching {needle}");
        }
    }

    #[test]
    fn text_search_treats_wildcards_literally() {
        let db = seeded();

        let filter = NoteFilter {
            search: Some("0%".into()),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, filter), vec!["Groceries"]);

        let filter = NoteFilter {
            search: Some("_".into()),
            ..NoteFilter::default()
        };
        assert!(find(&db, filter).is_empty());
    }

    #[test]
    fn any_tag_and_all_tags() {
        let db = seeded();

        let any = NoteFilter {
            tags: Some(vec!["HOME".into(), "systems".into()]),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, any), vec!["Rust notes", "Groceries"]);

        let all = NoteFilter {
            all_tags: Some(vec!["rust".into(), "lang".into(), "rust".into()]),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, all), vec!["Rust notes"]);
    }

    #[test]
    fn empty_tag_list_matches_nothing() {
        let db = seeded();
        let filter = NoteFilter {
            tags: Some(Vec::new()),
            ..NoteFilter::default()
        };
        assert!(find(&db, filter).is_empty());
    }

    #[test]
    fn tag_filter_does_not_narrow_loaded_tags() {
        let db = seeded();
        let repo = NoteRepository::new().unwrap();
        let scope = db.read_scope().unwrap();

        let filter = NoteFilter {
            tags: Some(vec!["systems".into()]),
            ..NoteFilter::default()
        };
        let page = repo
            .find_page(&scope, &filter, &PageRequest::of(0, 10).unwrap())
            .unwrap();

        assert_eq!(page.content()[0].tag_names(), vec!["lang", "rust", "systems"]);
    }

    #[test]
    fn color_and_pinned_filters() {
        let db = seeded();

        let green = NoteFilter {
            color: Some("green".into()),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, green), vec!["Groceries"]);

        let pinned = NoteFilter {
            pinned: Some(true),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, pinned), vec!["Rust notes"]);

        let unpinned_red = NoteFilter {
            pinned: Some(false),
            color: Some("red".into()),
            ..NoteFilter::default()
        };
        assert_eq!(find(&db, unpinned_red), vec!["Bob's rust"]);
    }

    #[test]
    fn find_by_id_hydrates_tags() {
        let db = seeded();
        let repo = NoteRepository::new().unwrap();
        let scope = db.read_scope().unwrap();

        let note = repo.find_by_id(&scope, NoteId::new(1)).unwrap().unwrap();
        assert_eq!(note.title(), "Rust notes");
        assert_eq!(note.color(), Some("red"));
        assert!(note.is_pinned());
        assert_eq!(note.created_at().unix_timestamp(), 100);
        assert_eq!(note.tags().len(), 3);

        assert_eq!(repo.find_by_id(&scope, NoteId::new(99)).unwrap(), None);
    }

    #[test]
    fn count_matches_filter_across_pages() {
        let db = seeded();
        let repo = NoteRepository::new().unwrap();
        let scope = db.read_scope().unwrap();

        let filter = NoteFilter {
            search: Some("rust".into()),
            ..NoteFilter::default()
        };
        assert_eq!(repo.count(&scope, &filter).unwrap(), 2);
    }

    #[test]
    fn sorts_by_declared_fields() {
        let db = seeded();
        let repo = NoteRepository::new().unwrap();
        let scope = db.read_scope().unwrap();

        let request = PageRequest::of(0, 2)
            .unwrap()
            .with_sort(Sort::desc("pinned").then("createdAt", crate::query::Direction::Desc));
        let page = repo
            .find_page(&scope, &NoteFilter::owned_by("alice"), &request)
            .unwrap();

        let titles: Vec<_> = page.content().iter().map(Note::title).collect();
        assert_eq!(titles, vec!["Rust notes", "Borrow checker"]);
        assert_eq!(page.total_elements(), 3);
    }
}
