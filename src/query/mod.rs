//! Generic paged query engine.
//!
//! An entity plugs in through three pieces: an [`EntitySchema`] naming its root
//! table and single identifier column, [`Predicate`]s for its filter
//! vocabulary, and a [`FetchPlan`] describing the joins that hydrate its
//! associations. [`PagedQuery`] runs the same four-phase protocol for all of them.

mod engine;
mod page;
mod predicate;
mod schema;

pub use engine::{FetchPlan, HYDRATION_BATCH_SIZE, PagedQuery, assemble};
pub use page::{Direction, Page, PageRequest, Sort, SortKey};
pub use predicate::{Condition, Predicate, contains_pattern};
pub use schema::{Entity, EntitySchema, Identifier};
