//! Composable filter conditions.
//!
//! A [`Predicate`] is a pure function from an entity's schema to a SQL
//! [`Condition`]. The same predicate is rendered for identifier selection,
//! counting and hydration, so it must only reference the root alias and must
//! express association constraints as subqueries rather than joins.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::types::Value;

use super::{Entity, EntitySchema};

const ALWAYS: &str = "1 = 1";
const NEVER: &str = "1 = 0";

/// A SQL boolean expression with its positional (`?`) parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    sql: String,
    params: Vec<Value>,
}

impl Condition {
    /// Creates a condition. `params` must match the `?` placeholders in `sql`, in order.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A condition every row satisfies.
    pub fn always() -> Self {
        Self::new(ALWAYS, Vec::new())
    }

    /// A condition no row satisfies.
    pub fn never() -> Self {
        Self::new(NEVER, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_always(&self) -> bool {
        self.sql == ALWAYS
    }

    pub fn is_never(&self) -> bool {
        self.sql == NEVER
    }

    pub fn and(self, other: Self) -> Self {
        if self.is_always() || other.is_never() {
            return other;
        }
        if other.is_always() || self.is_never() {
            return self;
        }
        self.combine("AND", other)
    }

    pub fn or(self, other: Self) -> Self {
        if self.is_never() || other.is_always() {
            return other;
        }
        if other.is_never() || self.is_always() {
            return self;
        }
        self.combine("OR", other)
    }

    pub fn not(self) -> Self {
        if self.is_always() {
            return Self::never();
        }
        if self.is_never() {
            return Self::always();
        }
        Self::new(format!("NOT ({})", self.sql), self.params)
    }

    fn combine(mut self, operator: &str, other: Self) -> Self {
        self.sql = format!("({}) {} ({})", self.sql, operator, other.sql);
        self.params.extend(other.params);
        self
    }
}

type BuildFn = dyn Fn(&EntitySchema) -> Condition + Send + Sync;

/// A reusable, typed filter over entity `E`.
///
/// Cloning is cheap; the underlying function is shared.
///
/// # Examples
///
/// ```
/// use jotter::query::{Condition, Predicate};
/// use jotter::Note;
/// use rusqlite::types::Value;
///
/// let pinned = Predicate::<Note>::from_fn(|schema| {
///     Condition::new(format!("{} = 1", schema.column("pinned")), Vec::new())
/// });
/// let owned = Predicate::<Note>::from_fn(|schema| {
///     Condition::new(
///         format!("{} = ?", schema.column("owner")),
///         vec![Value::Text("alice".into())],
///     )
/// });
///
/// let condition = pinned.and(owned).condition();
/// assert_eq!(condition.sql(), "(n.pinned = 1) AND (n.owner = ?)");
/// assert_eq!(condition.params().len(), 1);
/// ```
pub struct Predicate<E> {
    build: Arc<BuildFn>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self {
            build: Arc::clone(&self.build),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

impl<E: Entity + 'static> Predicate<E> {
    pub fn from_fn(build: impl Fn(&EntitySchema) -> Condition + Send + Sync + 'static) -> Self {
        Self {
            build: Arc::new(build),
            _entity: PhantomData,
        }
    }

    /// No constraint. Used for filter dimensions the caller left unset.
    pub fn all() -> Self {
        Self::from_fn(|_| Condition::always())
    }

    /// Matches nothing.
    pub fn none() -> Self {
        Self::from_fn(|_| Condition::never())
    }

    pub fn and(self, other: Self) -> Self {
        Self::from_fn(move |schema| self.condition_for(schema).and(other.condition_for(schema)))
    }

    pub fn or(self, other: Self) -> Self {
        Self::from_fn(move |schema| self.condition_for(schema).or(other.condition_for(schema)))
    }

    pub fn not(self) -> Self {
        Self::from_fn(move |schema| self.condition_for(schema).not())
    }

    /// Conjunction of every predicate; [`Predicate::all`] when empty.
    pub fn all_of(predicates: impl IntoIterator<Item = Self>) -> Self {
        predicates
            .into_iter()
            .reduce(Self::and)
            .unwrap_or_else(Self::all)
    }

    /// Renders the predicate against `E`'s schema.
    pub fn condition(&self) -> Condition {
        self.condition_for(E::schema())
    }

    pub fn condition_for(&self, schema: &EntitySchema) -> Condition {
        (self.build)(schema)
    }
}

/// Escapes `%`, `_` and `\` so `text` matches literally inside a `LIKE ... ESCAPE '\'` pattern,
/// and wraps it for substring matching.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
