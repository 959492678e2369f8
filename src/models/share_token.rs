use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Note, ShareTokenId};

/// A public link token granting read access to one note.
///
/// Always loaded together with its parent note. The parent is hydrated without
/// its tags; share listings only need the note's own columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken {
    id: ShareTokenId,
    token: String,
    owner: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    expires_at: Option<OffsetDateTime>,
    note: Note,
}

impl ShareToken {
    /// Creates a share token for `note`.
    pub fn new(
        id: ShareTokenId,
        token: impl Into<String>,
        owner: impl Into<String>,
        created_at: OffsetDateTime,
        expires_at: Option<OffsetDateTime>,
        note: Note,
    ) -> Self {
        Self {
            id,
            token: token.into(),
            owner: owner.into(),
            created_at,
            expires_at,
            note,
        }
    }

    pub fn id(&self) -> ShareTokenId {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    /// The shared note.
    pub fn note(&self) -> &Note {
        &self.note
    }

    /// Returns true when the token has no expiry or expires after `at`.
    ///
    /// ```
    /// use jotter::{NoteBuilder, NoteId, ShareToken, ShareTokenId};
    /// use time::{Duration, OffsetDateTime};
    ///
    /// let now = OffsetDateTime::now_utc();
    /// let note = NoteBuilder::new().id(NoteId::new(1)).content("x").build();
    /// let token = ShareToken::new(
    ///     ShareTokenId::new(1),
    ///     "abc",
    ///     "alice",
    ///     now,
    ///     Some(now + Duration::hours(1)),
    ///     note,
    /// );
    ///
    /// assert!(token.is_active_at(now));
    /// assert!(!token.is_active_at(now + Duration::hours(2)));
    /// ```
    pub fn is_active_at(&self, at: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|expires| expires > at)
    }
}
