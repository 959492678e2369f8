//! Error types for the query engine and the service layer.

use thiserror::Error;

use crate::NoteId;

/// Errors raised while building or running a paged query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The entity declares a multi-column identifier, which paged queries cannot select.
    #[error("entity `{entity}` has a composite identifier; paged queries need a single identifier column")]
    CompositeIdentifier { entity: &'static str },

    /// A sort key names a field outside the entity's sortable vocabulary.
    #[error("cannot sort `{entity}` by unknown field `{field}`")]
    UnknownSortField { entity: &'static str, field: String },

    /// Page index, size or sort syntax is out of range.
    #[error("invalid page request: {0}")]
    InvalidPageRequest(String),

    /// The database rejected or failed a query.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl QueryError {
    /// Returns true when the request itself was malformed.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UnknownSortField { .. } | Self::InvalidPageRequest(_))
    }
}

/// Errors surfaced by [`crate::NoteService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The referenced note does not exist.
    #[error("note {0} not found")]
    NoteNotFound(NoteId),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ServiceError {
    /// Returns true for errors caused by caller input rather than the backend.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NoteNotFound(_) => true,
            Self::Query(err) => err.is_user_error(),
            Self::Database(_) => false,
        }
    }
}
