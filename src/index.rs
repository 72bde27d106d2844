/// GridSync Column Value Index
///
/// Derives the distinct values of each column for the filter dropdowns.
/// Ordering is first-seen over the loaded set, deduplicated; callers that
/// want alphabetical re-sort the returned list. Recomputed whenever the
/// record store is swapped.

use crate::record::Record;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ColumnValueIndex {
    by_column: HashMap<String, Vec<String>>,
}

impl ColumnValueIndex {
    pub fn new() -> Self {
        ColumnValueIndex::default()
    }

    /// One-shot scan for a single column.
    pub fn distinct_values(records: &[Record], column: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();

        for record in records {
            let display = record.get_or_null(column).to_display_string();
            if display.is_empty() {
                continue;
            }
            if seen.insert(display.clone()) {
                values.push(display);
            }
        }

        values
    }

    /// Rebuild the cached index for the given columns after a store swap.
    pub fn rebuild(&mut self, records: &[Record], columns: &[String]) {
        self.by_column.clear();
        for column in columns {
            self.by_column
                .insert(column.clone(), Self::distinct_values(records, column));
        }
    }

    pub fn get(&self, column: &str) -> Option<&[String]> {
        self.by_column.get(column).map(|v| v.as_slice())
    }

    /// Columns that currently hold a cached value list.
    pub fn columns(&self) -> Vec<String> {
        self.by_column.keys().cloned().collect()
    }

    /// Cached read with lazy computation: columns are scanned the first time
    /// a filter dropdown asks for them, then served from the cache until the
    /// next store swap clears it.
    pub fn get_or_compute(&mut self, records: &[Record], column: &str) -> &[String] {
        self.by_column
            .entry(column.to_string())
            .or_insert_with(|| Self::distinct_values(records, column))
    }

    pub fn clear(&mut self) {
        self.by_column.clear();
    }
}
