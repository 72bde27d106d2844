/// GridSync - Client-Side Tabular Data Engine
///
/// Ingests a denormalized record set from a spreadsheet-backed remote store,
/// derives filtered / sorted / paginated views entirely in-process, and
/// synchronizes user edits back through batched, partially-failable bulk
/// updates with optimistic application and per-cell rollback.

pub mod value;
pub mod record;
pub mod filter;
pub mod paginate;
pub mod index;
pub mod pending;
pub mod sync;
pub mod stats;
pub mod session;
pub mod debounce;
pub mod error;

pub use value::CellValue;
pub use record::{Record, RecordStore};
pub use filter::{ColumnFilter, FilterEngine, FilterState, SortDirection, SortEngine};
pub use paginate::{Page, PaginationState, Paginator};
pub use index::ColumnValueIndex;
pub use pending::{CellStatus, PendingChangeMap, PendingChangeTracker, PendingEdit};
pub use sync::{
    BulkSyncCoordinator, BulkUpdateItem, BulkUpdateRequest, BulkUpdateResult, RemoteStore,
    StatsPayload, SyncConfig, SyncReport, SyncState, UpdateItemResult,
};
pub use stats::{CacheEntry, KeyValueStore, MemoryKvStore, StatsCache, StatsCacheConfig};
pub use session::{CellDisplay, SessionConfig, TableSession};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_DELAY};
pub use error::GridError;
