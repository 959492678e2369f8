use std::fmt::Debug;
use std::hash::Hash;

use rusqlite::types::{FromSql, ToSql};

use crate::error::QueryError;

/// How an entity's rows are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier {
    /// One scalar column.
    Single(&'static str),
    /// Several columns together. Declarable, but rejected by [`super::PagedQuery::new`].
    Composite(&'static [&'static str]),
}

/// Static description of an entity's root table, declared once per entity type.
///
/// Queries reference the root table through `alias`; predicates and fetch plans
/// must use the same alias.
#[derive(Debug)]
pub struct EntitySchema {
    /// Name used in errors and logs.
    pub name: &'static str,
    pub table: &'static str,
    pub alias: &'static str,
    pub identifier: Identifier,
    /// Sortable fields as `(field name, column)` pairs. Only these can appear in a sort.
    pub sortable: &'static [(&'static str, &'static str)],
}

impl EntitySchema {
    /// Qualifies `column` with the root alias, e.g. `n.title`.
    pub fn column(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }

    /// Root table with its alias, for use in a FROM clause.
    pub fn root(&self) -> String {
        format!("{} {}", self.table, self.alias)
    }

    /// The qualified identifier column.
    ///
    /// Fails for composite identifiers.
    pub fn identifier_column(&self) -> Result<String, QueryError> {
        match self.identifier {
            Identifier::Single(column) => Ok(self.column(column)),
            Identifier::Composite(_) => Err(QueryError::CompositeIdentifier { entity: self.name }),
        }
    }

    /// Looks up the column behind a sortable field name.
    pub fn sort_column(&self, field: &str) -> Option<&'static str> {
        self.sortable
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, column)| *column)
    }
}

/// A type loadable through a [`super::PagedQuery`].
pub trait Entity {
    /// Scalar identifier, bindable as a query parameter and readable from a row.
    type Id: ToSql + FromSql + Eq + Hash + Clone + Debug;

    fn schema() -> &'static EntitySchema;

    fn id(&self) -> Self::Id;
}
