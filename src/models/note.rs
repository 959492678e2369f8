use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{NoteId, Tag};

/// A note with its content and tags.
///
/// Notes are owned by a single user. Tags are kept sorted by name so two loads
/// of the same note compare equal regardless of the row order they were read in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    owner: String,
    title: String,
    content: String,
    color: Option<String>,
    pinned: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    tags: Vec<Tag>,
}

impl Note {
    /// Returns the note's unique identifier.
    pub fn id(&self) -> NoteId {
        self.id
    }

    /// Returns the owning user.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the note's title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the note's body text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the note's display color, if any.
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Returns whether the note is pinned.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Returns when the note was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Returns when the note was last updated.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Returns the note's tags, sorted by name.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns the tag names, sorted.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(Tag::name).collect()
    }

    /// Attaches a tag, keeping tags sorted by name. A tag already present is ignored.
    pub(crate) fn attach_tag(&mut self, tag: Tag) {
        if self.tags.iter().any(|existing| existing.id() == tag.id()) {
            return;
        }
        let position = self
            .tags
            .partition_point(|existing| (existing.name(), existing.id()) < (tag.name(), tag.id()));
        self.tags.insert(position, tag);
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use jotter::{NoteBuilder, NoteId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .owner("alice")
///     .title("Groceries")
///     .content("eggs, flour")
///     .build();
///
/// assert_eq!(note.id(), NoteId::new(1));
/// assert_eq!(note.title(), "Groceries");
/// assert!(note.tags().is_empty());
/// assert!(!note.is_pinned());
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    owner: Option<String>,
    title: Option<String>,
    content: Option<String>,
    color: Option<String>,
    pinned: bool,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
    tags: Vec<Tag>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the owner.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the display color.
    pub fn color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    /// Sets the pinned flag.
    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Sets the tags. Duplicates are dropped and the rest sorted by name.
    pub fn tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `id` or `content` have not been set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        let mut note = Note {
            id: self.id.expect("id is required"),
            owner: self.owner.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            content: self.content.expect("content is required"),
            color: self.color,
            pinned: self.pinned,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
            tags: Vec::with_capacity(self.tags.len()),
        };
        for tag in self.tags {
            note.attach_tag(tag);
        }
        note
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TagId;

    #[test]
    fn builder_sorts_and_dedups_tags() {
        let note = NoteBuilder::new()
            .id(NoteId::new(1))
            .content("body")
            .tags(vec![
                Tag::new(TagId::new(2), "zeta"),
                Tag::new(TagId::new(1), "alpha"),
                Tag::new(TagId::new(2), "zeta"),
            ])
            .build();

        assert_eq!(note.tag_names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn attach_tag_is_idempotent() {
        let mut note = NoteBuilder::new().id(NoteId::new(1)).content("body").build();

        note.attach_tag(Tag::new(TagId::new(5), "work"));
        note.attach_tag(Tag::new(TagId::new(5), "work"));
        note.attach_tag(Tag::new(TagId::new(4), "home"));

        assert_eq!(note.tag_names(), vec!["home", "work"]);
    }

    #[test]
    fn note_serialization_roundtrip() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let note = NoteBuilder::new()
            .id(NoteId::new(9))
            .owner("bob")
            .title("Trip")
            .content("Pack a tent")
            .color(Some("green".to_string()))
            .pinned(true)
            .created_at(now)
            .updated_at(now)
            .build();

        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();

        assert_eq!(back, note);
    }
}
