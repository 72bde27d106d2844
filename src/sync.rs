/// GridSync Bulk Sync Coordinator
///
/// Batches pending edits, applies them optimistically, submits them to the
/// remote store in one call, and reconciles the per-item outcome: confirmed
/// cells are committed, rejected cells are reverted individually, and a
/// total transport failure rolls everything back while keeping the edits
/// pending for retry.
///
/// # Lifecycle
///
/// ```text
/// Idle → Batching → Submitting → Reconciling → Idle
///                        └────────→ Failed ──→ Idle   (transport failure)
/// ```
///
/// The remote store offers no transactions and no version tokens, so every
/// update is last-write-wins at field granularity. Concurrent out-of-band
/// edits are not detected; a high per-batch failure rate triggers a full
/// view refetch as the only mitigation.

use crate::error::GridError;
use crate::pending::{CellStatus, PendingChangeTracker};
use crate::record::{Record, RecordStore};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Opaque aggregate object returned by the remote store's stats endpoint.
pub type StatsPayload = JsonValue;

/// One field-granular update on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateItem {
    pub record_id: String,
    pub field_name: String,
    pub new_value: JsonValue,
}

/// Ordered batch of updates submitted in a single remote call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkUpdateItem>,
}

impl BulkUpdateRequest {
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Per-item outcome reported by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemResult {
    pub record_id: String,
    pub field_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured response for one bulk update call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    pub total_updates: usize,
    pub successful_updates: usize,
    pub failed_updates: usize,
    pub results: Vec<UpdateItemResult>,
    #[serde(default)]
    pub processing_time_seconds: f64,
}

impl BulkUpdateResult {
    pub fn failure_rate(&self) -> f64 {
        if self.total_updates == 0 {
            0.0
        } else {
            self.failed_updates as f64 / self.total_updates as f64
        }
    }
}

/// The remote record store. This is the opaque network boundary: the actual
/// transport client (HTTP, spreadsheet API, test double) lives behind it.
///
/// The store is non-transactional and versionless: `submit_bulk_update` is
/// last-write-wins per field, and concurrent edits made out of band between
/// fetch and submit are silently overwritten.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full snapshot fetch of one view's rows.
    async fn fetch_view(&self, view_id: &str) -> Result<Vec<Record>, GridError>;

    /// Apply a batch of field updates; per-item success is reported in the
    /// structured result, total transport failure as `Err`.
    async fn submit_bulk_update(
        &self,
        request: BulkUpdateRequest,
    ) -> Result<BulkUpdateResult, GridError>;

    /// Fetch the aggregate stats object.
    async fn fetch_stats(&self) -> Result<StatsPayload, GridError>;
}

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Batching,
    Submitting,
    Reconciling,
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Batching => write!(f, "Batching"),
            Self::Submitting => write!(f, "Submitting"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Named sync policy knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// When `failed_updates / total_updates` exceeds this, the whole view is
    /// refetched and all optimistic state superseded.
    pub failure_rate_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            failure_rate_threshold: 0.10,
        }
    }
}

/// Everything needed to reconcile one in-flight submission: the view it
/// targets, the coalesced request, the pre-edit snapshot for rollback, and
/// the cells it touched.
#[derive(Debug)]
pub struct PreparedBatch {
    pub view_id: String,
    pub request: BulkUpdateRequest,
    snapshot: Vec<Record>,
    touched: Vec<(String, String)>,
}

/// Outcome of one submission, after reconciliation.
#[derive(Debug)]
pub struct SyncReport {
    pub result: BulkUpdateResult,
    /// The failure rate crossed the threshold and the view was refetched;
    /// some manual edits may need to be redone.
    pub refetched: bool,
    /// The active view changed while the submission was in flight, so the
    /// response was discarded instead of applied to an unrelated store.
    pub discarded: bool,
}

#[derive(Debug)]
pub struct BulkSyncCoordinator {
    config: SyncConfig,
    state: SyncState,
    in_flight: bool,
}

impl Default for BulkSyncCoordinator {
    fn default() -> Self {
        BulkSyncCoordinator::new(SyncConfig::default())
    }
}

impl BulkSyncCoordinator {
    pub fn new(config: SyncConfig) -> Self {
        BulkSyncCoordinator {
            config,
            state: SyncState::Idle,
            in_flight: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Phase 1: snapshot the store, apply every batchable edit optimistically,
    /// and build the coalesced request. Returns `None` when a submission is
    /// already in flight or nothing is batchable; edits made while in flight
    /// simply wait for the next batch.
    pub fn begin_submit(
        &mut self,
        view_id: &str,
        store: &mut RecordStore,
        tracker: &mut PendingChangeTracker,
    ) -> Option<PreparedBatch> {
        if self.in_flight {
            debug!("bulk sync already in flight, deferring new batch");
            return None;
        }

        self.state = SyncState::Batching;
        let batchable = tracker.batchable();
        if batchable.is_empty() {
            self.state = SyncState::Idle;
            return None;
        }

        let snapshot = store.snapshot();
        let mut request = BulkUpdateRequest::default();
        let mut touched = Vec::new();

        // The tracker holds one entry per cell (last-writer-wins), so the
        // request is already coalesced at (record_id, field_name) granularity.
        for edit in batchable {
            request.updates.push(BulkUpdateItem {
                record_id: edit.record_id.clone(),
                field_name: edit.field_name.clone(),
                new_value: serde_json::to_value(&edit.new_value)
                    .unwrap_or(JsonValue::Null),
            });
            touched.push((edit.record_id.clone(), edit.field_name.clone()));
        }

        // Optimistic application: the UI sees the new values immediately.
        for (record_id, field_name) in &touched {
            if let Some(edit) = tracker.get(record_id, field_name) {
                let value = edit.new_value.clone();
                store.set_value(record_id, field_name, value);
            }
            tracker.set_status(record_id, field_name, CellStatus::Submitting);
        }

        self.state = SyncState::Submitting;
        self.in_flight = true;
        info!(
            "submitting bulk update: {} cell(s) for view '{}'",
            request.len(),
            view_id
        );

        Some(PreparedBatch {
            view_id: view_id.to_string(),
            request,
            snapshot,
            touched,
        })
    }

    /// Phase 2: reconcile the transport outcome against the store and
    /// tracker. `current_view_id` is the session's view at resolution time;
    /// when it no longer matches the batch's tag the response is discarded.
    pub fn reconcile(
        &mut self,
        batch: PreparedBatch,
        outcome: Result<BulkUpdateResult, GridError>,
        current_view_id: &str,
        store: &mut RecordStore,
        tracker: &mut PendingChangeTracker,
    ) -> Result<SyncReport, GridError> {
        self.in_flight = false;

        if batch.view_id != current_view_id {
            // The store and tracker now belong to a different view; applying
            // this result would corrupt unrelated rows.
            warn!(
                "discarding bulk update result for stale view '{}' (active: '{}')",
                batch.view_id, current_view_id
            );
            self.state = SyncState::Idle;
            return Ok(SyncReport {
                result: outcome.unwrap_or_default(),
                refetched: false,
                discarded: true,
            });
        }

        let result = match outcome {
            Err(err) => {
                // Total transport failure: nothing reached the server. Roll
                // the store back wholesale and keep every edit pending so the
                // user can retry the same batch.
                warn!("bulk update transport failure: {}", err);
                self.state = SyncState::Failed;
                store.restore(batch.snapshot);
                for (record_id, field_name) in &batch.touched {
                    tracker.set_status(record_id, field_name, CellStatus::Pending);
                }
                self.state = SyncState::Idle;
                return Err(err);
            }
            Ok(result) => result,
        };

        self.state = SyncState::Reconciling;
        for item in &result.results {
            // A cell re-edited while in flight is back to Pending; its newer
            // value belongs to the next batch and must survive this one.
            let still_submitting = tracker.status(&item.record_id, &item.field_name)
                == CellStatus::Submitting;

            if item.success {
                // Confirmed: the optimistic value is now the committed value.
                if still_submitting {
                    tracker.clear_field(&item.record_id, &item.field_name);
                }
            } else {
                // Rejected: revert just this cell and flag it as failed,
                // distinct from merely-pending, so the UI can show the error.
                if let Some(edit) = tracker.get(&item.record_id, &item.field_name) {
                    let previous = edit.previous_value.clone();
                    store.set_value(&item.record_id, &item.field_name, previous);
                }
                if still_submitting {
                    tracker.set_status(&item.record_id, &item.field_name, CellStatus::Failed);
                }
                warn!(
                    "update rejected for {}.{}: {}",
                    item.record_id,
                    item.field_name,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        info!(
            "bulk update reconciled: {}/{} succeeded in {:.2}s",
            result.successful_updates, result.total_updates, result.processing_time_seconds
        );

        let refetch_needed = result.failure_rate() > self.config.failure_rate_threshold;
        self.state = SyncState::Idle;

        Ok(SyncReport {
            result,
            refetched: refetch_needed,
            discarded: false,
        })
    }

    /// Convenience wrapper chaining both phases against a remote store.
    /// When the failure rate crosses the threshold, refetches the view and
    /// supersedes all optimistic state.
    pub async fn submit(
        &mut self,
        remote: &dyn RemoteStore,
        view_id: &str,
        store: &mut RecordStore,
        tracker: &mut PendingChangeTracker,
    ) -> Result<SyncReport, GridError> {
        let Some(batch) = self.begin_submit(view_id, store, tracker) else {
            return Ok(SyncReport {
                result: BulkUpdateResult::default(),
                refetched: false,
                discarded: false,
            });
        };

        let outcome = remote.submit_bulk_update(batch.request.clone()).await;
        let report = self.reconcile(batch, outcome, view_id, store, tracker)?;

        if report.refetched {
            warn!(
                "failure rate {:.0}% exceeded threshold, refetching view '{}'",
                report.result.failure_rate() * 100.0,
                view_id
            );
            let records = remote.fetch_view(view_id).await?;
            store.swap(records);
            tracker.clear_all();
        }

        Ok(report)
    }
}
