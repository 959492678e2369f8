use std::cell::Cell;

use anyhow::Result;
use jotter::query::{Entity, FetchPlan, PageRequest, PagedQuery, Sort};
use jotter::repository::NoteFetchPlan;
use jotter::repository::note::predicates;
use jotter::{Database, NewNote, Note, NoteFilter, NoteId, NoteService};
use rusqlite::Row;

/// Note fetch plan that counts how many hydration queries were issued.
#[derive(Default)]
struct CountingPlan {
    inner: NoteFetchPlan,
    fetches: Cell<usize>,
}

impl FetchPlan<Note> for CountingPlan {
    fn select_list(&self) -> &str {
        self.inner.select_list()
    }

    fn from_clause(&self) -> &str {
        self.fetches.set(self.fetches.get() + 1);
        self.inner.from_clause()
    }

    fn read_entity(&self, row: &Row<'_>) -> rusqlite::Result<Note> {
        self.inner.read_entity(row)
    }

    fn merge_row(&self, note: &mut Note, row: &Row<'_>) -> rusqlite::Result<()> {
        self.inner.merge_row(note, row)
    }
}

fn seeded(titles: &[&str]) -> Result<(NoteService, Vec<NoteId>)> {
    let service = NoteService::new(Database::in_memory()?)?;
    let mut ids = Vec::new();
    for title in titles {
        let note = service.create_note(NewNote::new("alice", *title, "").tags(["x", "y"]))?;
        ids.push(note.id());
    }
    Ok((service, ids))
}

fn ids(notes: &[Note]) -> Vec<NoteId> {
    notes.iter().map(<Note as Entity>::id).collect()
}

#[test]
fn insertion_order_pages_split_evenly_with_short_tail() -> Result<()> {
    let (service, inserted) = seeded(&["a", "b", "c", "d", "e"])?;
    let query = PagedQuery::new(CountingPlan::default())?;
    let scope = service.database().read_scope()?;
    let first = PageRequest::of(0, 2)?.with_sort(Sort::asc("id"));

    let pages = [
        query.find_page(&scope, &predicates::owned_by("alice"), &first)?,
        query.find_page(&scope, &predicates::owned_by("alice"), &first.next())?,
        query.find_page(&scope, &predicates::owned_by("alice"), &first.next().next())?,
    ];

    assert_eq!(ids(pages[0].content()), inserted[0..2]);
    assert_eq!(ids(pages[1].content()), inserted[2..4]);
    assert_eq!(ids(pages[2].content()), inserted[4..5]);
    for page in &pages {
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.total_pages(), 3);
    }
    assert!(pages[2].is_last());
    Ok(())
}

#[test]
fn every_full_page_has_exactly_page_size_elements() -> Result<()> {
    let titles: Vec<String> = (0..23).map(|i| format!("note {i:02}")).collect();
    let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    let (service, _) = seeded(&title_refs)?;

    for size in [1, 4, 5, 7, 23, 30] {
        let mut request = PageRequest::of(0, size)?.with_sort(Sort::asc("title"));
        let mut seen = Vec::new();
        loop {
            let page = service.list_notes(&NoteFilter::default(), request.clone())?;
            assert_eq!(page.total_elements(), 23, "total is independent of page index");
            if page.is_last() {
                let tail = if 23 % size == 0 { size } else { 23 % size };
                assert_eq!(page.number_of_elements(), tail.min(23));
                seen.extend(ids(page.content()));
                break;
            }
            assert_eq!(page.number_of_elements(), size);
            seen.extend(ids(page.content()));
            request = request.next();
        }
        assert_eq!(seen.len(), 23, "pages cover every note once for size {size}");
    }
    Ok(())
}

#[test]
fn tagged_note_appears_once_with_all_tags() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?)?;
    let n1 = service.create_note(NewNote::new("alice", "n1", "").tags(["a", "b", "c"]))?;
    service.create_note(NewNote::new("alice", "n2", "").tags(["d"]))?;

    let filter = NoteFilter {
        tags: Some(vec!["b".into()]),
        ..NoteFilter::default()
    };
    let page = service.list_notes(&filter, PageRequest::of(0, 10)?)?;

    assert_eq!(ids(page.content()), vec![n1.id()]);
    assert_eq!(page.content()[0].tag_names(), vec!["a", "b", "c"]);
    assert_eq!(page.total_elements(), 1);
    Ok(())
}

#[test]
fn filter_without_matches_skips_hydration() -> Result<()> {
    let (service, _) = seeded(&["a", "b"])?;
    let query = PagedQuery::new(CountingPlan::default())?;
    let scope = service.database().read_scope()?;

    let page = query.find_page(&scope, &predicates::with_color("red"), &PageRequest::of(0, 10)?)?;

    assert!(page.is_empty());
    assert_eq!(page.total_elements(), 0);
    assert_eq!(query.plan().fetches.get(), 0);
    Ok(())
}

#[test]
fn page_past_the_end_is_empty_but_counts_everything() -> Result<()> {
    let (service, _) = seeded(&["a", "b", "c"])?;
    let query = PagedQuery::new(CountingPlan::default())?;
    let scope = service.database().read_scope()?;

    let page = query.find_page(&scope, &predicates::owned_by("alice"), &PageRequest::of(5, 10)?)?;

    assert!(page.is_empty());
    assert_eq!(page.total_elements(), 3);
    assert!(page.has_previous());
    assert!(!page.has_next());
    assert_eq!(query.plan().fetches.get(), 0);
    Ok(())
}

#[test]
fn content_order_follows_requested_sort() -> Result<()> {
    let (service, inserted) = seeded(&["b", "d", "a", "c"])?;

    let page = service.list_notes(
        &NoteFilter::default(),
        PageRequest::of(0, 4)?.with_sort(Sort::desc("title")),
    )?;

    let expected = vec![inserted[1], inserted[3], inserted[0], inserted[2]];
    assert_eq!(ids(page.content()), expected);
    Ok(())
}

#[test]
fn repeated_calls_return_identical_pages() -> Result<()> {
    let (service, _) = seeded(&["a", "b", "c", "d"])?;
    let filter = NoteFilter {
        search: Some("a".into()),
        ..NoteFilter::default()
    };
    let request = PageRequest::of(0, 3)?;

    let first = service.list_notes(&filter, request.clone())?;
    let second = service.list_notes(&filter, request)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn hydration_issues_one_query_per_page() -> Result<()> {
    let (service, _) = seeded(&["a", "b", "c"])?;
    let query = PagedQuery::new(CountingPlan::default())?;
    let scope = service.database().read_scope()?;

    query.find_page(&scope, &predicates::owned_by("alice"), &PageRequest::of(0, 2)?)?;

    assert_eq!(query.plan().fetches.get(), 1);
    Ok(())
}
