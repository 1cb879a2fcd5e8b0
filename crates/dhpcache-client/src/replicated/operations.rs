//! Replicated cache backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dhpcache_core::error::AppError;
use dhpcache_core::result::AppResult;
use dhpcache_core::traits::cache::CacheBackend;
use dhpcache_core::traits::logger::CacheLogger;

use super::codec::{decode_payload, encode_value};
use super::readiness::{Readiness, ReadinessTracker};
use crate::transport::{CacheTransport, ConnectionEvent, STORE_OK};

/// Fallback TTL when none is configured.
pub const DEFAULT_REPLICATED_TTL_SECONDS: u64 = 30;

/// Pattern matching every key, used by `clear`.
const ALL_KEYS: &str = "*";

/// Cache backend over a connection to a shared cache server.
///
/// Reads and writes are gated on connection readiness: while the connection
/// is not ready, `get` resolves `None` and `set` resolves `false` without
/// touching the transport. Transport failures are logged and swallowed;
/// only a failed key enumeration in `clear` is returned as an error.
#[derive(Debug)]
pub struct ReplicatedCacheClient {
    /// Connection to the server.
    transport: Arc<dyn CacheTransport>,
    /// Readiness flag, written only by connection events.
    readiness: Arc<ReadinessTracker>,
    /// Default TTL for entries.
    default_ttl: Duration,
    logger: Arc<dyn CacheLogger>,
    /// Task forwarding transport events into the readiness tracker.
    listener: Option<JoinHandle<()>>,
}

impl ReplicatedCacheClient {
    /// Create a client over `transport`, subscribe to its lifecycle events
    /// and start it.
    ///
    /// Must be called within a Tokio runtime; the event listener runs as a
    /// background task.
    pub fn new(
        transport: Arc<dyn CacheTransport>,
        default_ttl_seconds: Option<u64>,
        logger: Arc<dyn CacheLogger>,
    ) -> AppResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            AppError::configuration(format!(
                "Replicated cache requires a Tokio runtime: {e}"
            ))
        })?;

        let mut client = Self::detached(transport, default_ttl_seconds, logger);
        let events = client.transport.subscribe();
        client.listener = Some(handle.spawn(listen(
            events,
            Arc::clone(&client.readiness),
            Arc::clone(&client.logger),
        )));
        client.transport.start();
        Ok(client)
    }

    /// Create a client that does not listen to transport events. Readiness
    /// only changes through [`handle_event`](Self::handle_event).
    pub fn detached(
        transport: Arc<dyn CacheTransport>,
        default_ttl_seconds: Option<u64>,
        logger: Arc<dyn CacheLogger>,
    ) -> Self {
        let ttl = default_ttl_seconds
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_REPLICATED_TTL_SECONDS);
        let readiness = Arc::new(ReadinessTracker::new(
            transport.endpoint(),
            Arc::clone(&logger),
        ));

        Self {
            transport,
            readiness,
            default_ttl: Duration::from_secs(ttl),
            logger,
            listener: None,
        }
    }

    /// Apply a connection lifecycle event.
    pub fn handle_event(&self, event: &ConnectionEvent) -> Readiness {
        self.readiness.apply(event)
    }

    /// Current readiness.
    pub fn readiness(&self) -> Readiness {
        self.readiness.current()
    }

    /// Whether the connection is ready.
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Watch readiness changes.
    pub fn subscribe_readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Wait until ready, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        self.readiness.wait_ready(timeout).await
    }

    /// Default TTL applied when `set` gets none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn CacheTransport> {
        &self.transport
    }

    /// Whole seconds to send with `SETEX`. Fractions round up so a short
    /// non-zero TTL never collapses into the default.
    fn effective_ttl(&self, ttl: Option<Duration>) -> u64 {
        ttl.filter(|t| !t.is_zero())
            .map(|t| t.as_secs().saturating_add(u64::from(t.subsec_nanos() > 0)))
            .unwrap_or(self.default_ttl.as_secs())
    }
}

impl Drop for ReplicatedCacheClient {
    fn drop(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
    }
}

/// Forward transport events into the readiness tracker until the channel closes.
async fn listen(
    mut events: tokio::sync::broadcast::Receiver<ConnectionEvent>,
    readiness: Arc<ReadinessTracker>,
    logger: Arc<dyn CacheLogger>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                readiness.apply(&event);
            }
            Err(RecvError::Lagged(skipped)) => {
                logger.warn(&format!("Missed {skipped} remote cache connection events"));
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl CacheBackend for ReplicatedCacheClient {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        if !self.is_ready() {
            self.logger.warn("Not ready to read from cache");
            return Ok(None);
        }

        self.logger.info(&format!("Getting cache entry for key {key}"));
        match self.transport.fetch(key).await {
            Ok(raw) => {
                let value = decode_payload(raw);
                if value.is_some() {
                    self.logger
                        .info(&format!("Successfully retrieved cache entry for key {key}"));
                }
                Ok(value)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Failed to get cache entry for key {key}: {e}"));
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<bool> {
        if !self.is_ready() {
            self.logger.warn("Not ready to write to cache");
            return Ok(false);
        }

        let ttl = self.effective_ttl(ttl);
        self.logger.info(&format!(
            "Setting cache entry for key {key} with ttl of {ttl}s"
        ));
        let payload = encode_value(&value);
        match self.transport.store_with_expiry(key, ttl, &payload).await {
            Ok(status) if status == STORE_OK => Ok(true),
            Ok(status) => {
                self.logger.warn(&format!(
                    "Unexpected reply while setting cache entry for key {key}: {status}"
                ));
                Ok(false)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Failed to set cache entry for key {key}: {e}"));
                Ok(false)
            }
        }
    }

    async fn delete(&self, key: &str) -> AppResult<Option<Value>> {
        // Read first so the caller sees what was removed.
        let value = self.get(key).await?;

        match self.transport.remove(key).await {
            Ok(()) => {
                let shown = value
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "undefined".to_string());
                self.logger
                    .info(&format!("Successfully removed cache entry: {shown}"));
                Ok(value)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Failed to delete cache entry for key {key}: {e}"));
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> AppResult<()> {
        self.logger.info("Attempting to clear cache");
        let keys = self.transport.keys(ALL_KEYS).await.map_err(|e| {
            self.logger.error(&format!("Failed to clear cache: {e}"));
            e
        })?;

        let results = join_all(keys.iter().map(|key| self.delete(key))).await;
        results.into_iter().collect::<AppResult<Vec<_>>>()?;

        self.logger.info("Successfully cleared cache");
        Ok(())
    }
}
