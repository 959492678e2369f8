use serde::{Deserialize, Serialize};

use super::TagId;

/// A tag attached to one or more notes.
///
/// Names are stored lowercase and compared case-insensitively by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    id: TagId,
    name: String,
}

impl Tag {
    /// Creates a new tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use jotter::{Tag, TagId};
    ///
    /// let tag = Tag::new(TagId::new(1), "rust");
    /// assert_eq!(tag.id(), TagId::new(1));
    /// assert_eq!(tag.name(), "rust");
    /// ```
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns the tag's unique identifier.
    pub fn id(&self) -> TagId {
        self.id
    }

    /// Returns the tag's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalizes a user-supplied tag name: trimmed and lowercased.
    ///
    /// Returns `None` for names that are empty after trimming.
    ///
    /// ```
    /// use jotter::Tag;
    ///
    /// assert_eq!(Tag::normalize_name("  Rust "), Some("rust".to_string()));
    /// assert_eq!(Tag::normalize_name("   "), None);
    /// ```
    pub fn normalize_name(name: &str) -> Option<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }
}
