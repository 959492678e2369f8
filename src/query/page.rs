use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(QueryError::InvalidPageRequest(format!(
                "unknown sort direction `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

/// One sort key: a field from the entity's sortable vocabulary plus a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    /// Parses `field` or `field,asc|desc`, the form web clients send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(',') {
            Some((field, direction)) => (field.trim(), direction.parse()?),
            None => (s.trim(), Direction::Asc),
        };
        if field.is_empty() {
            return Err(QueryError::InvalidPageRequest(format!(
                "sort key `{s}` has no field"
            )));
        }
        Ok(Self::new(field, direction))
    }
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sort {
    keys: Vec<SortKey>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            keys: vec![SortKey::new(field, direction)],
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::by(field, Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::by(field, Direction::Desc)
    }

    /// Appends a lower-precedence key.
    pub fn then(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.keys.push(SortKey::new(field, direction));
        self
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_unsorted(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.keys.iter().any(|key| key.field == field)
    }

    /// Parses a list of `field[,direction]` strings.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self, QueryError> {
        let keys = specs
            .iter()
            .map(|spec| spec.as_ref().parse())
            .collect::<Result<Vec<SortKey>, _>>()?;
        Ok(Self { keys })
    }
}

impl FromIterator<SortKey> for Sort {
    fn from_iter<I: IntoIterator<Item = SortKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Paging {
    Paged { index: usize, size: usize },
    Unpaged,
}

/// Which slice of a result set to load, and in what order.
///
/// # Examples
///
/// ```
/// use jotter::query::{PageRequest, Sort};
///
/// let request = PageRequest::of(2, 10)?.with_sort(Sort::desc("createdAt"));
/// assert_eq!(request.offset(), 20);
/// assert_eq!(request.page_size(), Some(10));
/// assert!(PageRequest::of(0, 0).is_err());
/// # Ok::<(), jotter::QueryError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPageRequest")]
pub struct PageRequest {
    paging: Paging,
    sort: Sort,
}

/// Wire form of a `PageRequest`, checked by `PageRequest::of` on the way in.
#[derive(Deserialize)]
struct RawPageRequest {
    paging: Paging,
    #[serde(default)]
    sort: Sort,
}

impl TryFrom<RawPageRequest> for PageRequest {
    type Error = QueryError;

    fn try_from(raw: RawPageRequest) -> Result<Self, Self::Error> {
        let request = match raw.paging {
            Paging::Paged { index, size } => Self::of(index, size)?,
            Paging::Unpaged => Self::unpaged(),
        };
        Ok(request.with_sort(raw.sort))
    }
}

impl PageRequest {
    /// A paged request. `size` must be at least 1, and the offset must fit a SQLite integer.
    pub fn of(index: usize, size: usize) -> Result<Self, QueryError> {
        if size == 0 {
            return Err(QueryError::InvalidPageRequest(
                "page size must be at least 1".to_string(),
            ));
        }
        let offset_fits = index
            .checked_mul(size)
            .and_then(|offset| i64::try_from(offset).ok())
            .is_some();
        if !offset_fits || i64::try_from(size).is_err() {
            return Err(QueryError::InvalidPageRequest(format!(
                "page {index} of size {size} is out of range"
            )));
        }
        Ok(Self {
            paging: Paging::Paged { index, size },
            sort: Sort::unsorted(),
        })
    }

    /// Every matching entity in one page.
    pub fn unpaged() -> Self {
        Self {
            paging: Paging::Unpaged,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_paged(&self) -> bool {
        matches!(self.paging, Paging::Paged { .. })
    }

    /// Zero-based page index; always 0 when unpaged.
    pub fn page_index(&self) -> usize {
        match self.paging {
            Paging::Paged { index, .. } => index,
            Paging::Unpaged => 0,
        }
    }

    /// Page size, or `None` when unpaged.
    pub fn page_size(&self) -> Option<usize> {
        match self.paging {
            Paging::Paged { size, .. } => Some(size),
            Paging::Unpaged => None,
        }
    }

    pub fn offset(&self) -> usize {
        match self.paging {
            Paging::Paged { index, size } => index.saturating_mul(size),
            Paging::Unpaged => 0,
        }
    }

    /// The following page, or the same request when unpaged or already at the
    /// largest representable index.
    pub fn next(&self) -> Self {
        match self.paging {
            Paging::Paged { index, size } => Self::of(index.saturating_add(1), size)
                .map(|next| next.with_sort(self.sort.clone()))
                .unwrap_or_else(|_| self.clone()),
            Paging::Unpaged => self.clone(),
        }
    }

    pub fn previous_or_first(&self) -> Self {
        let mut previous = self.clone();
        if let Paging::Paged { index, size } = self.paging {
            previous.paging = Paging::Paged {
                index: index.saturating_sub(1),
                size,
            };
        }
        previous
    }

    pub fn first(&self) -> Self {
        let mut first = self.clone();
        if let Paging::Paged { size, .. } = self.paging {
            first.paging = Paging::Paged { index: 0, size };
        }
        first
    }
}

/// One page of hydrated entities with the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<E> {
    content: Vec<E>,
    request: PageRequest,
    total_elements: u64,
}

impl<E> Page<E> {
    pub fn new(content: Vec<E>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            request,
            total_elements,
        }
    }

    pub fn empty(request: PageRequest, total_elements: u64) -> Self {
        Self::new(Vec::new(), request, total_elements)
    }

    pub fn content(&self) -> &[E] {
        &self.content
    }

    pub fn into_content(self) -> Vec<E> {
        self.content
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Number of entities matching the filter across every page.
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of pages at this page size; an unpaged request always has one.
    pub fn total_pages(&self) -> u64 {
        match self.request.page_size() {
            Some(0) => 0,
            Some(size) => self.total_elements.div_ceil(size as u64),
            None => 1,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.request.page_index() as u64) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.request.page_index() > 0
    }

    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    /// Converts the content, keeping order and paging metadata.
    pub fn map<U>(self, f: impl FnMut(E) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            request: self.request,
            total_elements: self.total_elements,
        }
    }
}
