use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares an `i64`-backed identifier newtype that binds to and reads from SQLite
/// like the raw integer it wraps.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new ID.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying ID value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id! {
    /// Unique identifier for a note.
    ///
    /// Wraps a database ID to provide type safety and prevent accidental
    /// mixing of different ID types.
    NoteId
}

row_id! {
    /// Unique identifier for a tag.
    TagId
}

row_id! {
    /// Unique identifier for a share token row (not the token string itself).
    ShareTokenId
}
