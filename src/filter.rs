/// GridSync Filtering and Sorting
///
/// Filtered and sorted views are pure functions of the record set and the
/// filter state. There is no incremental index maintenance: every relevant
/// state change recomputes filter → sort → paginate from scratch, which at
/// admin-dashboard row counts is far below a frame budget and keeps the
/// derivation trivially correct.
///
/// Malformed values never raise: a cell that fails to parse as a number is
/// excluded by an active number filter and sorts after parsable cells, by
/// design of the untyped backing store.

use crate::record::Record;
use crate::value::CellValue;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Per-column filter, one variant per filter-UI widget.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    /// Checkbox list: keep rows whose stringified cell is in the set.
    ValueSet {
        selected: HashSet<String>,
        active: bool,
    },
    /// Free-text: case-insensitive substring over the stringified cell.
    Text { term: String, active: bool },
    /// Inclusive date window; a missing bound is unbounded on that side.
    DateRange {
        from: Option<String>,
        to: Option<String>,
    },
    /// Inclusive numeric window; a missing bound is unbounded on that side.
    NumberRange { min: Option<f64>, max: Option<f64> },
}

impl ColumnFilter {
    /// An inactive filter never excludes a row.
    pub fn is_active(&self) -> bool {
        match self {
            ColumnFilter::ValueSet { active, selected } => *active && !selected.is_empty(),
            ColumnFilter::Text { active, term } => *active && !term.trim().is_empty(),
            ColumnFilter::DateRange { from, to } => from.is_some() || to.is_some(),
            ColumnFilter::NumberRange { min, max } => min.is_some() || max.is_some(),
        }
    }

    fn matches(&self, record: &Record, column: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        let value = record.get_or_null(column);

        match self {
            ColumnFilter::ValueSet { selected, .. } => {
                selected.contains(&value.to_display_string())
            }
            ColumnFilter::Text { term, .. } => value
                .to_display_string()
                .to_lowercase()
                .contains(&term.trim().to_lowercase()),
            ColumnFilter::DateRange { from, to } => match value.as_date_lenient() {
                Some(date) => {
                    from.as_deref().map_or(true, |f| date.as_str() >= f)
                        && to.as_deref().map_or(true, |t| date.as_str() <= t)
                }
                // Unparsable date under an active range filter: excluded.
                None => false,
            },
            ColumnFilter::NumberRange { min, max } => match value.as_number_lenient() {
                Some(n) => {
                    min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)
                }
                None => false,
            },
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Complete filter/sort state for one table session.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub global_search: String,
    pub per_column: HashMap<String, ColumnFilter>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<SortDirection>,
}

impl FilterState {
    pub fn new() -> Self {
        FilterState::default()
    }

    pub fn has_active_filters(&self) -> bool {
        !self.global_search.trim().is_empty()
            || self.per_column.values().any(|f| f.is_active())
    }

    pub fn clear(&mut self) {
        self.global_search.clear();
        self.per_column.clear();
        self.sort_by = None;
        self.sort_direction = None;
    }
}

/// Applies global search and per-column filters. Pure and order-preserving;
/// all active filters AND together.
pub struct FilterEngine;

impl FilterEngine {
    pub fn apply<'a>(records: &'a [Record], state: &FilterState) -> Vec<&'a Record> {
        let search = state.global_search.trim().to_lowercase();

        records
            .iter()
            .filter(|record| {
                if !search.is_empty() && !Self::matches_global(record, &search) {
                    return false;
                }
                state
                    .per_column
                    .iter()
                    .all(|(column, filter)| filter.matches(record, column))
            })
            .collect()
    }

    /// A record matches the global search if any column's stringified value
    /// contains the term, case-insensitively. The business identity is a
    /// column like any other for search purposes.
    fn matches_global(record: &Record, lowered_term: &str) -> bool {
        record.id().to_lowercase().contains(lowered_term)
            || record
                .fields()
                .values()
                .any(|v| v.to_display_string().to_lowercase().contains(lowered_term))
    }
}

/// Stable sort over the filtered set.
///
/// Stability matters here: equal-key rows keep their relative input order,
/// so an incidental edit followed by a re-sort doesn't visually reshuffle
/// unrelated rows.
pub struct SortEngine;

/// Precomputed comparison key for one cell. Numbers compare numerically,
/// text compares case-insensitively after numbers, empties always last.
/// Precomputing gives the comparator a total order; pairwise lenient
/// parsing is not transitive across mixed cells and std's sort rejects
/// comparators that aren't.
#[derive(Debug, Clone, PartialEq)]
enum CellSortKey {
    Number(f64),
    Text(String),
    Empty,
}

impl CellSortKey {
    fn for_value(value: &CellValue) -> CellSortKey {
        if value.is_empty_like() {
            return CellSortKey::Empty;
        }
        match value.as_number_lenient() {
            Some(n) if n.is_finite() => CellSortKey::Number(n),
            _ => CellSortKey::Text(value.to_display_string().to_lowercase()),
        }
    }

    fn compare(&self, other: &CellSortKey, direction: SortDirection) -> Ordering {
        // Empty sorts last regardless of direction.
        let base = match (self, other) {
            (CellSortKey::Empty, CellSortKey::Empty) => return Ordering::Equal,
            (CellSortKey::Empty, _) => return Ordering::Greater,
            (_, CellSortKey::Empty) => return Ordering::Less,
            (CellSortKey::Number(a), CellSortKey::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (CellSortKey::Number(_), CellSortKey::Text(_)) => Ordering::Less,
            (CellSortKey::Text(_), CellSortKey::Number(_)) => Ordering::Greater,
            (CellSortKey::Text(a), CellSortKey::Text(b)) => a.cmp(b),
        };

        match direction {
            SortDirection::Ascending => base,
            SortDirection::Descending => base.reverse(),
        }
    }
}

impl SortEngine {
    pub fn apply<'a>(
        records: Vec<&'a Record>,
        sort_by: Option<&str>,
        direction: SortDirection,
    ) -> Vec<&'a Record> {
        let Some(column) = sort_by else {
            return records;
        };

        let mut decorated: Vec<(CellSortKey, &Record)> = records
            .into_iter()
            .map(|r| (CellSortKey::for_value(&r.get_or_null(column)), r))
            .collect();

        // Vec::sort_by is stable, which carries the equal-key guarantee.
        decorated.sort_by(|(ka, _), (kb, _)| ka.compare(kb, direction));
        decorated.into_iter().map(|(_, r)| r).collect()
    }
}
