/// GridSync Stats Cache
///
/// The dashboard's aggregate numbers are expensive for the remote store to
/// compute, so they are memoized with a freshness window and backed by a
/// durable side-store. When a refresh fails, a durable copy younger than the
/// grace window stands in; only when both are unavailable does the error
/// propagate.
///
/// The durable layer is an injected `KeyValueStore` capability so the engine
/// stays storage-backend-agnostic: production bindings may be a local file,
/// an embedded KV store, or browser storage.

use crate::error::GridError;
use crate::sync::{RemoteStore, StatsPayload};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The single key the stats cache owns in the durable store.
pub const STATS_CACHE_KEY: &str = "gridsync.stats";

/// Minimal durable keyed storage capability.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, GridError>;
    async fn set(&self, key: &str, value: String) -> Result<(), GridError>;
    async fn delete(&self, key: &str) -> Result<(), GridError>;
}

/// In-memory `KeyValueStore`, the default binding and the test double.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        MemoryKvStore::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GridError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), GridError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), GridError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// One memoized value and when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Epoch milliseconds.
    pub fetched_at: u64,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.fetched_at))
    }

    pub fn is_fresh(&self, now_ms: u64, window: Duration) -> bool {
        self.age(now_ms) < window
    }
}

/// Durable blob layout: `{value, timestamp}` under [`STATS_CACHE_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedStats {
    value: StatsPayload,
    timestamp: u64,
}

/// Named cache windows; never inline constants.
#[derive(Debug, Clone)]
pub struct StatsCacheConfig {
    /// How long a fetched value is served from memory without refetching.
    pub freshness_window: Duration,
    /// How old a durable fallback copy may be when a refresh fails.
    pub grace_window: Duration,
}

impl Default for StatsCacheConfig {
    fn default() -> Self {
        StatsCacheConfig {
            freshness_window: Duration::from_secs(5 * 60),
            grace_window: Duration::from_secs(60 * 60),
        }
    }
}

pub struct StatsCache {
    config: StatsCacheConfig,
    kv: Arc<dyn KeyValueStore>,
    memory: Option<CacheEntry<StatsPayload>>,
}

impl StatsCache {
    pub fn new(config: StatsCacheConfig, kv: Arc<dyn KeyValueStore>) -> Self {
        StatsCache {
            config,
            kv,
            memory: None,
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Fetch the stats payload, serving from memory while fresh.
    ///
    /// `force_refresh` bypasses the freshness check but still falls back to
    /// the durable copy when the fetch fails.
    pub async fn get(
        &mut self,
        remote: &dyn RemoteStore,
        force_refresh: bool,
    ) -> Result<StatsPayload, GridError> {
        let now = Self::now_ms();

        if !force_refresh {
            if let Some(entry) = &self.memory {
                if entry.is_fresh(now, self.config.freshness_window) {
                    debug!("stats served from memory ({:?} old)", entry.age(now));
                    return Ok(entry.value.clone());
                }
            }
        }

        match remote.fetch_stats().await {
            Ok(payload) => {
                self.memory = Some(CacheEntry {
                    value: payload.clone(),
                    fetched_at: now,
                });
                let blob = PersistedStats {
                    value: payload.clone(),
                    timestamp: now,
                };
                if let Err(err) = self
                    .kv
                    .set(STATS_CACHE_KEY, serde_json::to_string(&blob)?)
                    .await
                {
                    // A broken durable layer degrades the fallback path but
                    // must not fail a successful fetch.
                    warn!("failed to persist stats cache: {}", err);
                }
                Ok(payload)
            }
            Err(err) => {
                warn!("stats fetch failed, trying durable fallback: {}", err);
                match self.load_persisted().await? {
                    Some(blob)
                        if Duration::from_millis(now.saturating_sub(blob.timestamp))
                            < self.config.grace_window =>
                    {
                        Ok(blob.value)
                    }
                    _ => Err(GridError::StatsUnavailable {
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Drop both the memory value and the durable copy.
    pub async fn invalidate(&mut self) -> Result<(), GridError> {
        self.memory = None;
        self.kv.delete(STATS_CACHE_KEY).await
    }

    async fn load_persisted(&self) -> Result<Option<PersistedStats>, GridError> {
        let Some(raw) = self.kv.get(STATS_CACHE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) => {
                // A corrupt blob is treated as absent rather than fatal.
                warn!("discarding unreadable stats cache blob: {}", err);
                Ok(None)
            }
        }
    }

    #[cfg(test)]
    fn age_memory(&mut self, by: Duration) {
        if let Some(entry) = &mut self.memory {
            entry.fetched_at = entry.fetched_at.saturating_sub(by.as_millis() as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::sync::{BulkUpdateRequest, BulkUpdateResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Remote whose stats endpoint counts calls and can be switched to fail.
    struct CountingRemote {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingRemote {
        fn new() -> Self {
            CountingRemote {
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RemoteStore for CountingRemote {
        async fn fetch_view(&self, _view_id: &str) -> Result<Vec<Record>, GridError> {
            Ok(Vec::new())
        }

        async fn submit_bulk_update(
            &self,
            _request: BulkUpdateRequest,
        ) -> Result<BulkUpdateResult, GridError> {
            Ok(BulkUpdateResult::default())
        }

        async fn fetch_stats(&self) -> Result<StatsPayload, GridError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(GridError::transport("stats endpoint down"));
            }
            Ok(serde_json::json!({ "total_policies": 42, "fetch": n }))
        }
    }

    /// KV store whose writes fail, as a full disk or revoked permission would.
    struct ReadOnlyKv;

    #[async_trait]
    impl KeyValueStore for ReadOnlyKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, GridError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), GridError> {
            Err(GridError::storage("disk full"))
        }

        async fn delete(&self, _key: &str) -> Result<(), GridError> {
            Err(GridError::storage("disk full"))
        }
    }

    fn cache_with_windows(freshness_secs: u64, grace_secs: u64) -> StatsCache {
        StatsCache::new(
            StatsCacheConfig {
                freshness_window: Duration::from_secs(freshness_secs),
                grace_window: Duration::from_secs(grace_secs),
            },
            Arc::new(MemoryKvStore::new()),
        )
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetch() {
        let remote = CountingRemote::new();
        let mut cache = cache_with_windows(5 * 60, 3600);

        let first = cache.get(&remote, false).await.unwrap();
        assert_eq!(first["total_policies"], 42);
        assert_eq!(remote.calls(), 1);

        // Four minutes later: still inside the freshness window.
        cache.age_memory(Duration::from_secs(4 * 60));
        let second = cache.get(&remote, false).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_refetches() {
        let remote = CountingRemote::new();
        let mut cache = cache_with_windows(5 * 60, 3600);

        cache.get(&remote, false).await.unwrap();
        // Six minutes later: past the freshness window.
        cache.age_memory(Duration::from_secs(6 * 60));
        let refreshed = cache.get(&remote, false).await.unwrap();
        assert_eq!(remote.calls(), 2);
        assert_eq!(refreshed["fetch"], 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_freshness() {
        let remote = CountingRemote::new();
        let mut cache = cache_with_windows(5 * 60, 3600);

        cache.get(&remote, false).await.unwrap();
        cache.get(&remote, true).await.unwrap();
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_fallback_within_grace_window() {
        let remote = CountingRemote::new();
        let kv = Arc::new(MemoryKvStore::new());
        let mut cache = StatsCache::new(StatsCacheConfig::default(), kv.clone());

        // Successful fetch persists the durable copy.
        cache.get(&remote, false).await.unwrap();
        assert!(kv.get(STATS_CACHE_KEY).await.unwrap().is_some());

        // Endpoint goes down; a forced refresh serves the durable copy.
        remote.set_failing(true);
        let fallback = cache.get(&remote, true).await.unwrap();
        assert_eq!(fallback["total_policies"], 42);
    }

    #[tokio::test]
    async fn test_fallback_expired_propagates_error() {
        let remote = CountingRemote::new();
        let kv = Arc::new(MemoryKvStore::new());
        let mut cache = StatsCache::new(
            StatsCacheConfig {
                freshness_window: Duration::from_secs(300),
                grace_window: Duration::from_secs(3600),
            },
            kv.clone(),
        );

        // Plant a durable blob two hours old, well past the grace window.
        let stale = PersistedStats {
            value: serde_json::json!({ "total_policies": 1 }),
            timestamp: StatsCache::now_ms() - 2 * 3600 * 1000,
        };
        kv.set(STATS_CACHE_KEY, serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();

        remote.set_failing(true);
        let err = cache.get(&remote, false).await.unwrap_err();
        assert!(matches!(err, GridError::StatsUnavailable { .. }));
        assert!(err.to_string().contains("stats endpoint down"));
    }

    #[tokio::test]
    async fn test_corrupt_blob_treated_as_absent() {
        let remote = CountingRemote::new();
        let kv = Arc::new(MemoryKvStore::new());
        let mut cache = StatsCache::new(StatsCacheConfig::default(), kv.clone());

        kv.set(STATS_CACHE_KEY, "{not json".to_string())
            .await
            .unwrap();
        remote.set_failing(true);
        let err = cache.get(&remote, false).await.unwrap_err();
        assert!(matches!(err, GridError::StatsUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_fail_fetch() {
        let remote = CountingRemote::new();
        let mut cache = StatsCache::new(StatsCacheConfig::default(), Arc::new(ReadOnlyKv));

        let payload = cache.get(&remote, false).await.unwrap();
        assert_eq!(payload["total_policies"], 42);

        // The value still landed in the memory tier.
        let again = cache.get(&remote, false).await.unwrap();
        assert_eq!(again, payload);
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_tiers() {
        let remote = CountingRemote::new();
        let kv = Arc::new(MemoryKvStore::new());
        let mut cache = StatsCache::new(StatsCacheConfig::default(), kv.clone());

        cache.get(&remote, false).await.unwrap();
        cache.invalidate().await.unwrap();

        assert!(kv.get(STATS_CACHE_KEY).await.unwrap().is_none());
        cache.get(&remote, false).await.unwrap();
        assert_eq!(remote.calls(), 2);
    }
}
