//! Paged loading of entities with eagerly fetched one-to-many associations.
//!
//! Joining a one-to-many association multiplies rows, so LIMIT/OFFSET on the
//! joined query cuts pages at the wrong place. [`PagedQuery`] never paginates a
//! join. Each call runs four phases against one [`ReadScope`]:
//!
//! 1. select the page's identifiers from the root table (filter, sort, offset/limit)
//! 2. count every identifier matching the filter
//! 3. stop with an empty page when phase 1 found nothing
//! 4. fetch the full graph for exactly those identifiers, fold the fan-out rows
//!    into one entity per identifier, and emit them in phase 1's order

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::marker::PhantomData;

use rusqlite::{Row, ToSql};
use tracing::{debug, trace, warn};

use super::{Condition, Entity, EntitySchema, Page, PageRequest, Predicate, Sort};
use crate::db::ReadScope;
use crate::error::QueryError;

/// Maximum identifiers bound into a single hydration query.
pub const HYDRATION_BATCH_SIZE: usize = 500;

/// The entity-specific half of a paged query: how to load the full object graph.
///
/// The fetch query is `SELECT <identifier>, <select_list> FROM <from_clause> WHERE ...`.
/// Column 0 always holds the root identifier; the plan should read its own
/// columns by name. The root table must appear under the schema's alias.
pub trait FetchPlan<E: Entity> {
    /// Columns to select after the identifier.
    fn select_list(&self) -> &str;

    /// Root table plus the joins for every eagerly loaded association.
    fn from_clause(&self) -> &str;

    /// Builds the entity from the first row seen for its identifier.
    fn read_entity(&self, row: &Row<'_>) -> rusqlite::Result<E>;

    /// Folds one row's association columns into the entity. Called for every
    /// row, including the first.
    fn merge_row(&self, _entity: &mut E, _row: &Row<'_>) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// Four-phase paged query for entity `E`, hydrated through plan `P`.
///
/// Holds only immutable configuration, so one instance can serve any number of calls.
#[derive(Debug)]
pub struct PagedQuery<E, P> {
    schema: &'static EntitySchema,
    id_column: String,
    plan: P,
    _entity: PhantomData<fn() -> E>,
}

impl<E, P> PagedQuery<E, P>
where
    E: Entity + 'static,
    P: FetchPlan<E>,
{
    /// Creates the query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CompositeIdentifier`] if `E` is not identified by a single column.
    pub fn new(plan: P) -> Result<Self, QueryError> {
        let schema = E::schema();
        let id_column = schema.identifier_column()?;
        Ok(Self {
            schema,
            id_column,
            plan,
            _entity: PhantomData,
        })
    }

    pub fn plan(&self) -> &P {
        &self.plan
    }

    /// Loads one page of entities matching `predicate`.
    ///
    /// Content order always follows `request`'s sort. Identifiers that vanish
    /// between selection and hydration are dropped, so the page can come back
    /// shorter than the page size.
    pub fn find_page(
        &self,
        scope: &ReadScope<'_>,
        predicate: &Predicate<E>,
        request: &PageRequest,
    ) -> Result<Page<E>, QueryError> {
        let condition = predicate.condition();

        let ids = self.select_identifiers(scope, &condition, request)?;
        let total_elements = self.count_matching(scope, &condition)?;
        debug!(
            subsystem = "query",
            entity = self.schema.name,
            op = "select",
            page_index = request.page_index(),
            page_size = ?request.page_size(),
            result_count = ids.len(),
            total_elements,
            "Selected page identifiers"
        );

        if ids.is_empty() {
            return Ok(Page::empty(request.clone(), total_elements));
        }

        let entities = self.hydrate(scope, &condition, &ids)?;
        let content = assemble(&ids, entities);
        if content.len() < ids.len() {
            warn!(
                subsystem = "query",
                entity = self.schema.name,
                op = "assemble",
                missing = ids.len() - content.len(),
                "Identifiers disappeared between selection and hydration; page shrunk"
            );
        }

        Ok(Page::new(content, request.clone(), total_elements))
    }

    /// Counts every entity matching `predicate`.
    pub fn count(&self, scope: &ReadScope<'_>, predicate: &Predicate<E>) -> Result<u64, QueryError> {
        self.count_matching(scope, &predicate.condition())
    }

    fn select_identifiers(
        &self,
        scope: &ReadScope<'_>,
        condition: &Condition,
        request: &PageRequest,
    ) -> Result<Vec<E::Id>, QueryError> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}{}",
            self.id_column,
            self.schema.root(),
            condition.sql(),
            self.order_clause(request.sort())?
        );

        // PageRequest::of guarantees both fit in i64.
        let window = request
            .page_size()
            .map(|size| (size as i64, request.offset() as i64));

        let mut params: Vec<&dyn ToSql> = condition.params().iter().map(|p| p as &dyn ToSql).collect();
        if let Some((limit, offset)) = &window {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(limit);
            params.push(offset);
        }
        trace!(subsystem = "query", entity = self.schema.name, sql = %sql, "Identifier query");

        let mut stmt = scope.connection().prepare(&sql)?;
        let ids = stmt
            .query_map(params.as_slice(), |row| row.get::<_, E::Id>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn count_matching(&self, scope: &ReadScope<'_>, condition: &Condition) -> Result<u64, QueryError> {
        let sql = format!(
            "SELECT COUNT({}) FROM {} WHERE {}",
            self.id_column,
            self.schema.root(),
            condition.sql()
        );
        trace!(subsystem = "query", entity = self.schema.name, sql = %sql, "Count query");

        let params: Vec<&dyn ToSql> = condition.params().iter().map(|p| p as &dyn ToSql).collect();
        let total: i64 = scope
            .connection()
            .query_row(&sql, params.as_slice(), |row| row.get(0))?;
        Ok(total.unsigned_abs())
    }

    fn hydrate(
        &self,
        scope: &ReadScope<'_>,
        condition: &Condition,
        ids: &[E::Id],
    ) -> Result<HashMap<E::Id, E>, QueryError> {
        let mut entities = HashMap::with_capacity(ids.len());

        for batch in ids.chunks(HYDRATION_BATCH_SIZE) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT {id} AS hydrated_id, {columns} FROM {from} WHERE ({condition}) AND {id} IN ({placeholders})",
                id = self.id_column,
                columns = self.plan.select_list(),
                from = self.plan.from_clause(),
                condition = condition.sql(),
            );
            trace!(subsystem = "query", entity = self.schema.name, sql = %sql, "Fetch query");

            let mut params: Vec<&dyn ToSql> =
                condition.params().iter().map(|p| p as &dyn ToSql).collect();
            params.extend(batch.iter().map(|id| id as &dyn ToSql));

            let mut stmt = scope.connection().prepare(&sql)?;
            let mut rows = stmt.query(params.as_slice())?;
            while let Some(row) = rows.next()? {
                let id: E::Id = row.get(0)?;
                match entities.entry(id) {
                    Entry::Occupied(mut seen) => self.plan.merge_row(seen.get_mut(), row)?,
                    Entry::Vacant(slot) => {
                        let mut entity = self.plan.read_entity(row)?;
                        debug_assert_eq!(&entity.id(), slot.key(), "fetch plan read a different row");
                        self.plan.merge_row(&mut entity, row)?;
                        slot.insert(entity);
                    }
                }
            }
        }

        Ok(entities)
    }

    /// Translates `sort` into an ORDER BY clause through the schema's sortable fields.
    fn order_clause(&self, sort: &Sort) -> Result<String, QueryError> {
        if sort.is_unsorted() {
            return Ok(String::new());
        }
        let terms = sort
            .keys()
            .iter()
            .map(|key| {
                let column = self.schema.sort_column(&key.field).ok_or_else(|| {
                    QueryError::UnknownSortField {
                        entity: self.schema.name,
                        field: key.field.clone(),
                    }
                })?;
                Ok(format!("{} {}", self.schema.column(column), key.direction.as_sql()))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

/// Orders hydrated entities by `ids`, skipping identifiers with no entity.
pub fn assemble<Id, E>(ids: &[Id], mut entities: HashMap<Id, E>) -> Vec<E>
where
    Id: Eq + Hash,
{
    ids.iter().filter_map(|id| entities.remove(id)).collect()
}
