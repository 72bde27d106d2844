/// GridSync Table Session
///
/// One `TableSession` owns everything for the active view: the record store,
/// filter and pagination state, the pending-change tracker, the sync
/// coordinator, the column value index, and the stats cache. No two sessions
/// share a store; switching views swaps the row set wholesale inside the
/// same session.
///
/// Derived pages are pure recomputations of store + state on every read.
/// Consumers register an explicit change listener via [`TableSession::subscribe`]
/// and re-read `get_page` when notified; there is no implicit reactive
/// dependency graph.

use crate::error::GridError;
use crate::filter::{ColumnFilter, FilterEngine, FilterState, SortDirection, SortEngine};
use crate::index::ColumnValueIndex;
use crate::paginate::{Page, PaginationState, Paginator};
use crate::pending::{CellStatus, PendingChangeTracker};
use crate::record::{Record, RecordStore};
use crate::stats::{KeyValueStore, StatsCache, StatsCacheConfig};
use crate::sync::{BulkSyncCoordinator, RemoteStore, StatsPayload, SyncConfig, SyncReport};
use crate::value::CellValue;
use log::info;
use std::sync::Arc;

/// What the UI renders for one cell: the effective value and whether it is
/// committed, unsaved, in flight, or rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CellDisplay {
    pub value: CellValue,
    pub status: CellStatus,
}

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The view (logical sheet) this session starts on.
    pub view_id: String,
    /// Column holding the business identity (e.g. the policy number).
    pub id_field: String,
    pub page_size: usize,
    pub sync: SyncConfig,
    pub stats: StatsCacheConfig,
}

impl SessionConfig {
    pub fn new(view_id: impl Into<String>, id_field: impl Into<String>) -> Self {
        SessionConfig {
            view_id: view_id.into(),
            id_field: id_field.into(),
            page_size: 20,
            sync: SyncConfig::default(),
            stats: StatsCacheConfig::default(),
        }
    }
}

type ChangeListener = Box<dyn Fn() + Send>;

pub struct TableSession {
    remote: Arc<dyn RemoteStore>,
    view_id: String,
    id_field: String,
    store: RecordStore,
    filter_state: FilterState,
    pagination: PaginationState,
    tracker: PendingChangeTracker,
    coordinator: BulkSyncCoordinator,
    index: ColumnValueIndex,
    stats: StatsCache,
    listeners: Vec<(u64, ChangeListener)>,
    next_listener_id: u64,
}

impl TableSession {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        kv: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        TableSession {
            remote,
            view_id: config.view_id,
            id_field: config.id_field,
            store: RecordStore::new(),
            filter_state: FilterState::new(),
            pagination: PaginationState::new(config.page_size),
            tracker: PendingChangeTracker::new(),
            coordinator: BulkSyncCoordinator::new(config.sync),
            index: ColumnValueIndex::new(),
            stats: StatsCache::new(config.stats, kv),
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.count()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.tracker.has_pending()
    }

    // --- lifecycle -------------------------------------------------------

    /// Switch to (or initially load) a view: full snapshot fetch, wholesale
    /// swap, and a reset of all per-view state. Unsubmitted edits belonging
    /// to the previous view are dropped with it.
    pub async fn load_view(&mut self, view_id: &str) -> Result<(), GridError> {
        let records = self.remote.fetch_view(view_id).await?;
        info!("loaded view '{}': {} record(s)", view_id, records.len());

        self.view_id = view_id.to_string();
        self.store.swap(records);
        self.tracker.clear_all();
        self.index.clear();
        self.filter_state.clear();
        self.pagination = PaginationState::new(self.pagination.page_size);
        self.notify();
        Ok(())
    }

    /// Refetch the current view. Filters and sort survive; all optimistic
    /// state is superseded by the fresh snapshot, and dropdown value lists
    /// already scanned are recomputed from the new rows.
    pub async fn refresh(&mut self) -> Result<(), GridError> {
        let records = self.remote.fetch_view(&self.view_id).await?;
        self.store.swap(records);
        self.tracker.clear_all();
        let warm_columns = self.index.columns();
        self.index.rebuild(self.store.records(), &warm_columns);
        self.notify();
        Ok(())
    }

    // --- derived views ---------------------------------------------------

    /// The current page: filter → sort → paginate, recomputed on every call.
    pub fn get_page(&self) -> Page<Record> {
        let filtered = FilterEngine::apply(self.store.records(), &self.filter_state);
        let sorted = SortEngine::apply(
            filtered,
            self.filter_state.sort_by.as_deref(),
            self.filter_state
                .sort_direction
                .unwrap_or(SortDirection::Ascending),
        );
        let page = Paginator::slice(&sorted, self.pagination.page, self.pagination.page_size);

        Page {
            data: page.data.into_iter().cloned().collect(),
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            total_records: page.total_records,
        }
    }

    /// Distinct values of one column for its filter dropdown, cached until
    /// the next store swap.
    pub fn distinct_values(&mut self, column: &str) -> Vec<String> {
        self.index
            .get_or_compute(self.store.records(), column)
            .to_vec()
    }

    // --- filter / sort / pagination state --------------------------------

    pub fn set_global_search(&mut self, term: impl Into<String>) {
        self.filter_state.global_search = term.into();
        self.pagination.set_page(1);
        self.notify();
    }

    pub fn set_column_filter(&mut self, column: impl Into<String>, filter: ColumnFilter) {
        self.filter_state.per_column.insert(column.into(), filter);
        self.pagination.set_page(1);
        self.notify();
    }

    pub fn remove_column_filter(&mut self, column: &str) {
        self.filter_state.per_column.remove(column);
        self.pagination.set_page(1);
        self.notify();
    }

    pub fn set_sort(&mut self, column: Option<String>, direction: SortDirection) {
        self.filter_state.sort_by = column;
        self.filter_state.sort_direction = Some(direction);
        self.notify();
    }

    pub fn clear_all_filters(&mut self) {
        self.filter_state.clear();
        self.pagination.set_page(1);
        self.notify();
    }

    pub fn set_page(&mut self, page: usize) {
        self.pagination.set_page(page);
        self.notify();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.pagination.set_page_size(page_size);
        self.notify();
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter_state
    }

    // --- edit flow -------------------------------------------------------

    /// Record a local edit. The committed value in the store is untouched
    /// until submission; the UI sees the new value through
    /// [`TableSession::get_cell_display`]. Editing a cell back to its
    /// committed value withdraws the pending entry.
    pub fn edit_cell(
        &mut self,
        record_id: &str,
        field_name: &str,
        new_value: impl Into<CellValue>,
    ) -> Result<(), GridError> {
        let new_value = new_value.into();

        let Some(committed) = self.store.get_value(record_id, field_name) else {
            return Err(GridError::Validation {
                field_name: field_name.to_string(),
                message: format!("record '{}' is not in the loaded view", record_id),
            });
        };

        let in_flight =
            self.tracker.status(record_id, field_name) == CellStatus::Submitting;
        if new_value == committed && !in_flight {
            // A pending edit exists only while the value differs from the
            // last-confirmed one.
            self.tracker.clear_field(record_id, field_name);
        } else {
            self.tracker
                .set_pending(record_id, field_name, new_value, committed);
        }

        self.notify();
        Ok(())
    }

    /// The effective value and status for one cell.
    pub fn get_cell_display(&self, record_id: &str, field_name: &str) -> CellDisplay {
        let committed = self
            .store
            .get_value(record_id, field_name)
            .unwrap_or(CellValue::Null);

        CellDisplay {
            value: self
                .tracker
                .display_value(record_id, field_name, committed),
            status: self.tracker.status(record_id, field_name),
        }
    }

    /// Submit all batchable edits as one bulk update and reconcile the
    /// outcome. See [`BulkSyncCoordinator`] for the full contract.
    pub async fn submit_pending_changes(&mut self) -> Result<SyncReport, GridError> {
        let view_id = self.view_id.clone();
        let result = self
            .coordinator
            .submit(
                self.remote.as_ref(),
                &view_id,
                &mut self.store,
                &mut self.tracker,
            )
            .await;

        if let Ok(report) = &result {
            if report.refetched {
                // The bulk-sync refetch replaced the row set.
                self.index.clear();
            }
        }
        self.notify();
        result
    }

    // --- stats -----------------------------------------------------------

    pub async fn get_stats(&mut self, force_refresh: bool) -> Result<StatsPayload, GridError> {
        self.stats.get(self.remote.as_ref(), force_refresh).await
    }

    // --- change notification ---------------------------------------------

    /// Register a state-change listener. Every mutation of session state
    /// fires every listener exactly once.
    pub fn subscribe<F>(&mut self, listener: F) -> u64
    where
        F: Fn() + Send + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: u64) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    fn notify(&self) {
        for (_, listener) in &self.listeners {
            listener();
        }
    }
}
