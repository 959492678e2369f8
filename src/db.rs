mod schema;

use std::path::Path;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Row, Transaction};
use time::OffsetDateTime;
use tracing::debug;

use schema::INITIAL_SCHEMA;

/// SQL function lowercasing its text argument with Unicode rules.
///
/// SQLite's own `lower()` only folds ASCII, so case-insensitive matching must
/// fold both the column and the pattern through this.
pub const FOLD_CASE: &str = "fold_case";

/// Database wrapper providing connection management and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;
        debug!(subsystem = "db", path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Initializes the database schema and registers custom SQL functions.
    ///
    /// Uses IF NOT EXISTS for idempotent execution.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        register_functions(&self.conn)?;
        self.conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    ///
    /// Useful for executing custom queries in tests or write operations.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Opens a read scope: a deferred transaction that gives every query run
    /// through it the same snapshot of the database.
    ///
    /// The scope borrows the connection, so no other transaction can be started
    /// on it while the scope is alive. Dropping the scope ends the transaction.
    pub fn read_scope(&self) -> rusqlite::Result<ReadScope<'_>> {
        let tx = self.conn.unchecked_transaction()?;
        Ok(ReadScope { tx })
    }
}

/// A consistent read-only view of the database shared by all phases of a paged query.
///
/// Nothing written through a scope is ever committed: the transaction is rolled
/// back by [`ReadScope::finish`] or on drop, whichever comes first.
pub struct ReadScope<'conn> {
    tx: Transaction<'conn>,
}

impl ReadScope<'_> {
    /// Returns the connection the scope's queries run on.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Ends the scope explicitly, surfacing any error from releasing it.
    pub fn finish(self) -> rusqlite::Result<()> {
        self.tx.rollback()
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

/// Reads a Unix-seconds column as an `OffsetDateTime`.
pub(crate) fn timestamp_column(row: &Row<'_>, column: &str) -> rusqlite::Result<OffsetDateTime> {
    let seconds: i64 = row.get(column)?;
    to_datetime(row, column, seconds)
}

/// Reads a nullable Unix-seconds column.
pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    column: &str,
) -> rusqlite::Result<Option<OffsetDateTime>> {
    let seconds: Option<i64> = row.get(column)?;
    seconds
        .map(|seconds| to_datetime(row, column, seconds))
        .transpose()
}

fn to_datetime(row: &Row<'_>, column: &str, seconds: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(e))
    })
}
