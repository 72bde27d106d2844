/// GridSync Pending Change Tracking
///
/// Buffers local edits between the moment the user types and the moment the
/// remote store confirms them, keyed by `(record_id, field_name)`. This is
/// the UI's single read path for showing unsaved edits: `display_value`
/// returns the pending value when one exists, else the committed one.
///
/// The tracker has no network side effects; the sync coordinator drains it
/// and reports outcomes back per cell.

use crate::value::CellValue;
use std::collections::HashMap;
use std::time::SystemTime;

/// Whether a cell currently shows committed data, an unsaved edit, an edit
/// in flight, or an edit the server rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Committed,
    Pending,
    Submitting,
    Failed,
}

/// One unconfirmed field change.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub record_id: String,
    pub field_name: String,
    pub new_value: CellValue,
    pub previous_value: CellValue,
    pub submitted_at: SystemTime,
    pub status: CellStatus,
}

/// Map of unconfirmed edits: record id → field name → edit.
pub type PendingChangeMap = HashMap<String, HashMap<String, PendingEdit>>;

#[derive(Debug, Default)]
pub struct PendingChangeTracker {
    edits: PendingChangeMap,
}

impl PendingChangeTracker {
    pub fn new() -> Self {
        PendingChangeTracker::default()
    }

    /// Record an edit, overwriting any existing entry for the same cell
    /// (last-writer-wins before submission). `previous_value` is captured
    /// from the first edit of the cell so a later rollback restores the
    /// last-confirmed value, not an intermediate keystroke.
    pub fn set_pending(
        &mut self,
        record_id: impl Into<String>,
        field_name: impl Into<String>,
        new_value: CellValue,
        committed_value: CellValue,
    ) {
        let record_id = record_id.into();
        let field_name = field_name.into();

        let fields = self.edits.entry(record_id.clone()).or_default();
        let previous_value = fields
            .get(&field_name)
            .map(|e| e.previous_value.clone())
            .unwrap_or(committed_value);

        fields.insert(
            field_name.clone(),
            PendingEdit {
                record_id,
                field_name,
                new_value,
                previous_value,
                submitted_at: SystemTime::now(),
                status: CellStatus::Pending,
            },
        );
    }

    /// The value the UI should display for a cell.
    pub fn display_value(
        &self,
        record_id: &str,
        field_name: &str,
        committed_value: CellValue,
    ) -> CellValue {
        self.get(record_id, field_name)
            .map(|e| e.new_value.clone())
            .unwrap_or(committed_value)
    }

    pub fn get(&self, record_id: &str, field_name: &str) -> Option<&PendingEdit> {
        self.edits.get(record_id).and_then(|f| f.get(field_name))
    }

    pub fn status(&self, record_id: &str, field_name: &str) -> CellStatus {
        self.get(record_id, field_name)
            .map(|e| e.status)
            .unwrap_or(CellStatus::Committed)
    }

    pub fn set_status(&mut self, record_id: &str, field_name: &str, status: CellStatus) {
        if let Some(edit) = self
            .edits
            .get_mut(record_id)
            .and_then(|f| f.get_mut(field_name))
        {
            edit.status = status;
        }
    }

    /// Clear one field's entry.
    pub fn clear_field(&mut self, record_id: &str, field_name: &str) {
        if let Some(fields) = self.edits.get_mut(record_id) {
            fields.remove(field_name);
            if fields.is_empty() {
                self.edits.remove(record_id);
            }
        }
    }

    /// Clear every entry for a record.
    pub fn clear_record(&mut self, record_id: &str) {
        self.edits.remove(record_id);
    }

    pub fn clear_all(&mut self) {
        self.edits.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn count(&self) -> usize {
        self.edits.values().map(|f| f.len()).sum()
    }

    /// Edits eligible for a new batch. Cells already in flight are excluded
    /// until their prior result resolves, so nothing is double-submitted.
    pub fn batchable(&self) -> Vec<&PendingEdit> {
        let mut edits: Vec<&PendingEdit> = self
            .edits
            .values()
            .flat_map(|f| f.values())
            .filter(|e| matches!(e.status, CellStatus::Pending | CellStatus::Failed))
            .collect();
        // Deterministic request order: oldest edit first, cell key breaks ties.
        edits.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
                .then_with(|| a.field_name.cmp(&b.field_name))
        });
        edits
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingEdit> {
        self.edits.values().flat_map(|f| f.values())
    }
}
