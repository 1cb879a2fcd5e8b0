//! In-memory cache backend using the moka crate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use serde_json::{Value, json};

use dhpcache_core::result::AppResult;
use dhpcache_core::traits::cache::CacheBackend;
use dhpcache_core::traits::logger::CacheLogger;

/// Fallback TTL when none is configured.
pub const DEFAULT_LOCAL_TTL_SECONDS: u64 = 360;

/// Stored value plus the TTL it was written with.
#[derive(Debug, Clone)]
struct LocalEntry {
    value: Value,
    ttl: Duration,
}

/// Per-entry expiry: each entry lives for the TTL it was written with.
struct EntryExpiry;

impl Expiry<String, LocalEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backend.
///
/// Expiry and explicit removal are reported to the logger; nothing else
/// observes them.
#[derive(Debug, Clone)]
pub struct LocalCacheClient {
    /// The underlying moka cache.
    cache: Cache<String, LocalEntry>,
    /// Default TTL for entries.
    default_ttl: Duration,
    logger: Arc<dyn CacheLogger>,
}

impl LocalCacheClient {
    /// Create a local cache. `None` or zero TTL falls back to
    /// [`DEFAULT_LOCAL_TTL_SECONDS`].
    pub fn new(default_ttl_seconds: Option<u64>, logger: Arc<dyn CacheLogger>) -> Self {
        let ttl = default_ttl_seconds
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_LOCAL_TTL_SECONDS);

        let listener_logger = Arc::clone(&logger);
        let cache = Cache::builder()
            .expire_after(EntryExpiry)
            .eviction_listener(move |key: Arc<String>, entry: LocalEntry, cause: RemovalCause| {
                let event = json!({ "key": key.as_str(), "value": entry.value });
                match cause {
                    RemovalCause::Expired => {
                        listener_logger.info(&format!("Cache entry expired: {event}"));
                    }
                    RemovalCause::Explicit => {
                        listener_logger.info(&format!("Cache entry deleted: {event}"));
                    }
                    _ => {}
                }
            })
            .build();

        Self {
            cache,
            default_ttl: Duration::from_secs(ttl),
            logger,
        }
    }

    /// Default TTL applied when `set` gets none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Approximate number of entries, after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheBackend for LocalCacheClient {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        self.logger.info(&format!("Getting cache entry for key {key}"));
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<bool> {
        self.logger.info(&format!("Setting cache entry for key {key}"));
        let ttl = ttl.filter(|t| !t.is_zero()).unwrap_or(self.default_ttl);
        self.cache
            .insert(key.to_string(), LocalEntry { value, ttl })
            .await;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> AppResult<Option<Value>> {
        self.logger.info(&format!("Deleting cache entry for key {key}"));
        Ok(self.cache.remove(key).await.map(|entry| entry.value))
    }

    async fn clear(&self) -> AppResult<()> {
        self.logger.info("Clearing cache");
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.logger.info("Cache cleared");
        Ok(())
    }
}
