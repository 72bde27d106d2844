/// GridSync Record Store
///
/// Holds the denormalized row set for the active view. Rows are correlated
/// with the remote store by a business identity field (a policy number or
/// similar), never by positional index: the spreadsheet behind the remote
/// store reorders freely between fetches.
///
/// The store is replaced wholesale on view switch or refresh. The only
/// in-place mutations are field-granular writes driven by the edit flow,
/// plus snapshot/restore used by the sync coordinator for rollback.

use crate::value::CellValue;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// One row of business data. `id` is the business identity value; `fields`
/// maps column keys to scalar cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    fields: HashMap<String, CellValue>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    /// Build a record from a raw JSON row, designating one field as the
    /// business identity. Returns `None` when the identity field is missing
    /// or empty; such rows cannot be correlated and are dropped at ingest.
    pub fn from_json_row(row: &HashMap<String, JsonValue>, id_field: &str) -> Option<Record> {
        let id = match row.get(id_field) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => return None,
        };

        let mut fields = HashMap::new();
        for (key, value) in row {
            fields.insert(key.clone(), CellValue::from_json(value));
        }

        Some(Record { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields.get(field)
    }

    /// Missing fields read as `Null`; the spreadsheet omits blank cells.
    pub fn get_or_null(&self, field: &str) -> CellValue {
        self.fields.get(field).cloned().unwrap_or(CellValue::Null)
    }

    pub fn set(&mut self, field: impl Into<String>, value: CellValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> &HashMap<String, CellValue> {
        &self.fields
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

/// The row set for the active view, in fetch order.
///
/// Keeps a side map from record id to position so edit-flow lookups don't
/// scan. The map is rebuilt on every swap; ids are unique within a loaded
/// set (duplicate ids keep the first occurrence and drop the rest).
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        RecordStore::default()
    }

    /// Replace the entire row set. Full-set swap is the only load path;
    /// there is no incremental ingest.
    pub fn swap(&mut self, records: Vec<Record>) {
        self.records.clear();
        self.positions.clear();
        for record in records {
            if self.positions.contains_key(record.id()) {
                continue;
            }
            self.positions
                .insert(record.id().to_string(), self.records.len());
            self.records.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, record_id: &str) -> Option<&Record> {
        self.positions
            .get(record_id)
            .and_then(|&pos| self.records.get(pos))
    }

    /// Read one cell; missing record or field reads as `None`.
    pub fn get_value(&self, record_id: &str, field: &str) -> Option<CellValue> {
        self.get(record_id).map(|r| r.get_or_null(field))
    }

    /// Write one cell by business identity. Returns false when the record
    /// is not in the loaded set.
    pub fn set_value(&mut self, record_id: &str, field: &str, value: CellValue) -> bool {
        match self.positions.get(record_id) {
            Some(&pos) => {
                self.records[pos].set(field, value);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.positions.contains_key(record_id)
    }

    /// Clone the current row set for later rollback.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Restore a previously taken snapshot, discarding all edits since.
    pub fn restore(&mut self, snapshot: Vec<Record>) {
        self.swap(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("P1").with_field("amt", "100").with_field("status", "active"),
            Record::new("P2").with_field("amt", "50").with_field("status", "lapsed"),
            Record::new("P3").with_field("amt", "200").with_field("status", "active"),
        ]
    }

    #[test]
    fn test_swap_and_lookup() {
        let mut store = RecordStore::new();
        store.swap(sample_records());

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get("P2").unwrap().get_or_null("status"),
            CellValue::String("lapsed".into())
        );
        assert!(store.get("P9").is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut store = RecordStore::new();
        store.swap(vec![
            Record::new("P1").with_field("amt", "100"),
            Record::new("P1").with_field("amt", "999"),
        ]);

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_value("P1", "amt"),
            Some(CellValue::String("100".into()))
        );
    }

    #[test]
    fn test_set_value_by_id() {
        let mut store = RecordStore::new();
        store.swap(sample_records());

        assert!(store.set_value("P2", "amt", CellValue::String("75".into())));
        assert_eq!(
            store.get_value("P2", "amt"),
            Some(CellValue::String("75".into()))
        );
        assert!(!store.set_value("P9", "amt", CellValue::Null));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut store = RecordStore::new();
        store.swap(sample_records());

        let snapshot = store.snapshot();
        store.set_value("P1", "amt", CellValue::String("1".into()));
        store.set_value("P3", "amt", CellValue::String("2".into()));

        store.restore(snapshot);
        assert_eq!(
            store.get_value("P1", "amt"),
            Some(CellValue::String("100".into()))
        );
        assert_eq!(
            store.get_value("P3", "amt"),
            Some(CellValue::String("200".into()))
        );
    }

    #[test]
    fn test_from_json_row() {
        let mut row = HashMap::new();
        row.insert("policy_number".to_string(), serde_json::json!("PN-77"));
        row.insert("premium".to_string(), serde_json::json!(1250.5));
        row.insert("note".to_string(), serde_json::json!(null));

        let record = Record::from_json_row(&row, "policy_number").unwrap();
        assert_eq!(record.id(), "PN-77");
        assert_eq!(record.get_or_null("premium"), CellValue::Number(1250.5));
        assert_eq!(record.get_or_null("note"), CellValue::Null);
        assert_eq!(record.get_or_null("missing"), CellValue::Null);
    }

    #[test]
    fn test_from_json_row_missing_identity() {
        let mut row = HashMap::new();
        row.insert("premium".to_string(), serde_json::json!(10));
        assert!(Record::from_json_row(&row, "policy_number").is_none());

        let mut row = HashMap::new();
        row.insert("policy_number".to_string(), serde_json::json!("  "));
        assert!(Record::from_json_row(&row, "policy_number").is_none());
    }
}
