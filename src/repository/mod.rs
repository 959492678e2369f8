//! Paged repositories built on [`crate::query::PagedQuery`].

/// Root note columns as selected by every fetch plan that loads a note.
macro_rules! note_columns {
    () => {
        "n.id AS note_id, n.owner AS note_owner, n.title AS note_title, \
         n.content AS note_content, n.color AS note_color, n.pinned AS note_pinned, \
         n.created_at AS note_created_at, n.updated_at AS note_updated_at"
    };
}

pub mod note;
pub mod share_token;

pub use note::{NoteFetchPlan, NoteFilter, NoteRepository};
pub use share_token::{ShareTokenFetchPlan, ShareTokenFilter, ShareTokenRepository};
