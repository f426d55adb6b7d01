//! Client-side filtering, sorting and paging of fetched collections

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use hsadmin_shared::Resource;

use crate::selection::BatchSelection;

// =============================================================================
// Filters
// =============================================================================

/// Attribute a text filter looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Alias,
    Id,
    /// Name, alias or ID
    Any,
    /// Numeric comparison on the record's count (members for rooms)
    Count,
}

impl FromStr for FilterField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" | "1" => Ok(FilterField::Name),
            "alias" | "2" => Ok(FilterField::Alias),
            "id" | "3" => Ok(FilterField::Id),
            "any" | "4" => Ok(FilterField::Any),
            "count" | "members" | "5" => Ok(FilterField::Count),
            other => Err(FilterError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterField::Name => "name",
            FilterField::Alias => "alias",
            FilterField::Id => "ID",
            FilterField::Any => "any field",
            FilterField::Count => "count",
        };
        f.write_str(name)
    }
}

/// Numeric predicate: `5`, `=5`, `>10`, `<20`, `10-50`, `10-`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPredicate {
    Eq(u64),
    Gt(u64),
    Lt(u64),
    Between(u64, Option<u64>),
}

impl CountPredicate {
    pub fn matches(&self, value: u64) -> bool {
        match *self {
            CountPredicate::Eq(n) => value == n,
            CountPredicate::Gt(n) => value > n,
            CountPredicate::Lt(n) => value < n,
            CountPredicate::Between(min, max) => value >= min && max.map_or(true, |m| value <= m),
        }
    }
}

impl FromStr for CountPredicate {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let number = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| FilterError::InvalidCount(text.to_string()))
        };

        if let Some(rest) = text.strip_prefix('>') {
            Ok(CountPredicate::Gt(number(rest)?))
        } else if let Some(rest) = text.strip_prefix('<') {
            Ok(CountPredicate::Lt(number(rest)?))
        } else if let Some(rest) = text.strip_prefix('=') {
            Ok(CountPredicate::Eq(number(rest)?))
        } else if let Some((min, max)) = text.split_once('-') {
            let min = if min.trim().is_empty() { 0 } else { number(min)? };
            let max = if max.trim().is_empty() { None } else { Some(number(max)?) };
            Ok(CountPredicate::Between(min, max))
        } else {
            Ok(CountPredicate::Eq(number(text)?))
        }
    }
}

/// A client-side filter over a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Case-insensitive substring match
    Text { field: FilterField, needle: String },
    Count(CountPredicate),
}

impl Filter {
    pub fn parse(field: FilterField, text: &str) -> Result<Self, FilterError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FilterError::Empty);
        }
        match field {
            FilterField::Count => Ok(Filter::Count(text.parse()?)),
            field => Ok(Filter::Text {
                field,
                needle: text.to_lowercase(),
            }),
        }
    }

    pub fn matches<R: Resource>(&self, item: &R) -> bool {
        match self {
            Filter::Count(predicate) => item.count().map_or(false, |c| predicate.matches(c)),
            Filter::Text { field, needle } => {
                let hit = |value: Option<&str>| {
                    value.map_or(false, |v| v.to_lowercase().contains(needle.as_str()))
                };
                match field {
                    FilterField::Name => hit(item.name()),
                    FilterField::Alias => hit(item.alias()),
                    FilterField::Id => hit(Some(item.id())),
                    FilterField::Any | FilterField::Count => {
                        hit(item.name()) || hit(item.alias()) || hit(Some(item.id()))
                    }
                }
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Text { field, needle } => write!(f, "'{}' ({})", needle, field),
            Filter::Count(CountPredicate::Eq(n)) => write!(f, "count = {}", n),
            Filter::Count(CountPredicate::Gt(n)) => write!(f, "count > {}", n),
            Filter::Count(CountPredicate::Lt(n)) => write!(f, "count < {}", n),
            Filter::Count(CountPredicate::Between(min, Some(max))) => {
                write!(f, "count {}-{}", min, max)
            }
            Filter::Count(CountPredicate::Between(min, None)) => write!(f, "count >= {}", min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Filter text is empty")]
    Empty,
    #[error("Unknown filter field '{0}' (expected name, alias, id, any or count)")]
    UnknownField(String),
    #[error("Invalid count filter '{0}' (examples: 5, >10, <20, 10-50)")]
    InvalidCount(String),
    #[error("Unknown sort key '{0}' (expected name, alias, id, count, date or role)")]
    UnknownSortKey(String),
}

// =============================================================================
// Sorting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Alias,
    Id,
    Count,
    Date,
    /// Role group first, then identifier
    Role,
}

/// Sort order; `-count` or `count:desc` sorts descending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub descending: bool,
}

impl Sort {
    pub fn new(key: SortKey, descending: bool) -> Self {
        Self { key, descending }
    }

    pub fn compare<R: Resource>(&self, a: &R, b: &R) -> Ordering {
        let lower = |v: Option<&str>| v.map(str::to_lowercase);
        let ordering = match self.key {
            SortKey::Name => lower(a.name()).cmp(&lower(b.name())),
            SortKey::Alias => lower(a.alias()).cmp(&lower(b.alias())),
            SortKey::Id => a.id().to_lowercase().cmp(&b.id().to_lowercase()),
            SortKey::Count => a.count().cmp(&b.count()),
            SortKey::Date => a.created_at().cmp(&b.created_at()),
            SortKey::Role => a
                .role_rank()
                .cmp(&b.role_rank())
                .then_with(|| a.id().to_lowercase().cmp(&b.id().to_lowercase())),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for Sort {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        let (text, mut descending) = match text.strip_prefix('-') {
            Some(rest) => (rest.to_string(), true),
            None => (text.clone(), false),
        };
        let key_text = match text.split_once(':') {
            Some((key, order)) => {
                descending = descending || order.trim() == "desc";
                key.trim().to_string()
            }
            None => text,
        };
        let key = match key_text.as_str() {
            "name" => SortKey::Name,
            "alias" => SortKey::Alias,
            "id" => SortKey::Id,
            "count" | "members" => SortKey::Count,
            "date" | "created" => SortKey::Date,
            "role" => SortKey::Role,
            _ => return Err(FilterError::UnknownSortKey(s.trim().to_string())),
        };
        Ok(Sort { key, descending })
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            SortKey::Name => "name",
            SortKey::Alias => "alias",
            SortKey::Id => "id",
            SortKey::Count => "count",
            SortKey::Date => "date",
            SortKey::Role => "role",
        };
        write!(f, "{} ({})", key, if self.descending { "desc" } else { "asc" })
    }
}

/// Indices of `items` that pass `filter`, ordered by `sort`.
///
/// Sorting is stable, so ties keep the server's order.
pub fn apply<R: Resource>(items: &[R], filter: Option<&Filter>, sort: Option<&Sort>) -> Vec<usize> {
    let mut view: Vec<usize> = (0..items.len())
        .filter(|&i| filter.map_or(true, |f| f.matches(&items[i])))
        .collect();
    if let Some(sort) = sort {
        view.sort_by(|&a, &b| sort.compare(&items[a], &items[b]));
    }
    view
}

// =============================================================================
// Listing
// =============================================================================

/// In-memory listing being filtered, sorted and paged by the operator
#[derive(Debug, Clone)]
pub struct Listing<R> {
    items: Vec<R>,
    filter: Option<Filter>,
    sort: Option<Sort>,
    view: Vec<usize>,
    page: usize,
    page_size: usize,
}

impl<R: Resource> Listing<R> {
    pub fn new(items: Vec<R>, page_size: usize) -> Self {
        let view = (0..items.len()).collect();
        Self {
            items,
            filter: None,
            sort: None,
            view,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    fn refresh(&mut self) {
        self.view = apply(&self.items, self.filter.as_ref(), self.sort.as_ref());
        self.page = 0;
    }

    pub fn set_filter(&mut self, filter: Option<Filter>) {
        self.filter = filter;
        self.refresh();
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) {
        self.sort = sort;
        self.refresh();
    }

    /// Drop both filter and sort
    pub fn reset(&mut self) {
        self.filter = None;
        self.sort = None;
        self.refresh();
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// Number of items fetched from the server
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Number of items passing the filter
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Displayed items, in display order
    pub fn visible(&self) -> Vec<&R> {
        self.view.iter().map(|&i| &self.items[i]).collect()
    }

    pub fn page_count(&self) -> usize {
        self.view.len().div_ceil(self.page_size).max(1)
    }

    /// Zero-based current page
    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to a one-based page number
    pub fn goto_page(&mut self, page: usize) -> bool {
        if page >= 1 && page <= self.page_count() {
            self.page = page - 1;
            true
        } else {
            false
        }
    }

    /// Rows on the current page with their one-based display index
    pub fn page_rows(&self) -> Vec<(usize, &R)> {
        let start = self.page * self.page_size;
        self.view
            .iter()
            .enumerate()
            .skip(start)
            .take(self.page_size)
            .map(|(pos, &i)| (pos + 1, &self.items[i]))
            .collect()
    }

    /// Items named by `selection`, which must have been parsed against `len()`
    pub fn resolve(&self, selection: &BatchSelection) -> Vec<R> {
        selection
            .resolve(&self.view)
            .into_iter()
            .map(|&i| self.items[i].clone())
            .collect()
    }

    /// "Rooms: 4/10" plus the active filter and sort
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{}: {}/{}",
            capitalize(R::KIND.plural()),
            self.len(),
            self.total()
        )];
        if let Some(filter) = &self.filter {
            lines.push(format!("Filter: {}", filter));
        }
        if let Some(sort) = &self.sort {
            lines.push(format!("Sort: {}", sort));
        }
        if self.page_count() > 1 {
            lines.push(format!("Page {} of {}", self.page + 1, self.page_count()));
        }
        lines
    }
}

/// Render one listing row the way every listing shows it
pub fn render_row<R: Resource>(index: usize, item: &R) -> Vec<String> {
    let mut lines = vec![format!("{:3}. {}", index, item.headline())];
    lines.extend(item.details().into_iter().map(|d| format!("     {}", d)));
    lines
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
