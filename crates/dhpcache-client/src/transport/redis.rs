//! Redis transport with background connection management.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::MultiplexedConnection;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use dhpcache_core::config::cache::ReplicatedCacheConfig;
use dhpcache_core::error::{AppError, ErrorKind};
use dhpcache_core::result::AppResult;

use super::{CacheTransport, ConnectionEvent, RawValue};

/// State shared between the transport handle and its supervisor task.
struct Shared {
    client: Client,
    endpoint: String,
    /// Current connection; `None` while disconnected.
    conn: watch::Sender<Option<MultiplexedConnection>>,
    /// Wakes the supervisor after a connection is discarded.
    wake: Notify,
    events: broadcast::Sender<ConnectionEvent>,
    enable_offline_queue: bool,
    /// Longest a queued command waits for a connection.
    connect_timeout: Duration,
    reconnect_interval: Duration,
}

impl Shared {
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }
}

/// Redis-backed [`CacheTransport`].
///
/// Connecting happens in a supervisor task started by
/// [`CacheTransport::start`]. It retries every `reconnect_interval_ms` until
/// a connection is established, and again whenever a command reports the
/// connection as dropped.
pub struct RedisTransport {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTransport")
            .field("endpoint", &self.shared.endpoint)
            .field("connected", &self.shared.conn.borrow().is_some())
            .field("enable_offline_queue", &self.shared.enable_offline_queue)
            .finish()
    }
}

impl RedisTransport {
    /// Create a transport from configuration. Does not connect yet.
    pub fn new(config: &ReplicatedCacheConfig) -> AppResult<Self> {
        let url = config.redis_url();
        debug!(url = %mask_redis_url(&url), "Creating Redis transport");

        let client = Client::open(url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Failed to create Redis client", e)
        })?;

        let (conn, _) = watch::channel(None);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                endpoint: format!("{}:{}", config.host, config.port),
                conn,
                wake: Notify::new(),
                events,
                enable_offline_queue: config.enable_offline_queue,
                connect_timeout: Duration::from_millis(config.connect_timeout_ms),
                reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            }),
            supervisor: Mutex::new(None),
        })
    }

    /// Whether a connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.shared.conn.borrow().is_some()
    }

    /// Get the current connection. With the offline queue enabled, wait for
    /// one up to `connect_timeout_ms`.
    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        if let Some(conn) = self.shared.conn.borrow().as_ref() {
            return Ok(conn.clone());
        }

        if !self.shared.enable_offline_queue {
            return Err(AppError::service_unavailable(format!(
                "Redis connection to {} is not available",
                self.shared.endpoint
            )));
        }

        let mut rx = self.shared.conn.subscribe();
        let waited = tokio::time::timeout(
            self.shared.connect_timeout,
            rx.wait_for(|conn| conn.is_some()),
        )
        .await
        .map_err(|_| {
            AppError::service_unavailable(format!(
                "Timed out after {}ms waiting for Redis connection to {}",
                self.shared.connect_timeout.as_millis(),
                self.shared.endpoint
            ))
        })?;
        let conn =
            waited.map_err(|_| AppError::service_unavailable("Redis transport was shut down"))?;
        conn.clone()
            .ok_or_else(|| AppError::service_unavailable("Redis connection was lost"))
    }

    /// Map a command failure, discarding the connection when it is dead.
    fn command_failed(&self, command: &str, e: redis::RedisError) -> AppError {
        if e.is_connection_dropped() || e.is_io_error() {
            if self.shared.conn.send_replace(None).is_some() {
                warn!(endpoint = %self.shared.endpoint, error = %e, "Redis connection lost");
                self.shared.emit(ConnectionEvent::Reconnecting {
                    reason: e.to_string(),
                });
                self.shared.wake.notify_one();
            }
        } else {
            self.shared.emit(ConnectionEvent::Error {
                reason: e.to_string(),
            });
        }
        AppError::with_source(ErrorKind::Cache, format!("Redis {command} failed: {e}"), e)
    }
}

#[async_trait]
impl CacheTransport for RedisTransport {
    async fn fetch(&self, key: &str) -> AppResult<Option<RawValue>> {
        let mut conn = self.connection().await?;
        let result: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_failed("GET", e))?;

        Ok(result.map(|bytes| match String::from_utf8(bytes) {
            Ok(text) => RawValue::Text(text),
            Err(e) => RawValue::Bytes(e.into_bytes()),
        }))
    }

    async fn store_with_expiry(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> AppResult<String> {
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| self.command_failed("SETEX", e))
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| self.command_failed("DEL", e))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = self.connection().await?;
        redis::cmd("KEYS")
            .arg(pattern)
            .query_async::<Vec<String>>(&mut conn)
            .await
            .map_err(|e| self.command_failed("KEYS", e))
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    fn start(&self) {
        let Ok(mut supervisor) = self.supervisor.lock() else {
            return;
        };
        if supervisor.is_some() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                *supervisor = Some(handle.spawn(supervise(Arc::clone(&self.shared))));
            }
            Err(e) => {
                error!(error = %e, "Cannot start Redis transport outside a Tokio runtime");
                self.shared.emit(ConnectionEvent::ConnectFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn endpoint(&self) -> String {
        self.shared.endpoint.clone()
    }
}

impl Drop for RedisTransport {
    fn drop(&mut self) {
        if let Ok(mut supervisor) = self.supervisor.lock() {
            if let Some(task) = supervisor.take() {
                task.abort();
            }
        }
    }
}

/// Keep a connection established for as long as the transport lives.
async fn supervise(shared: Arc<Shared>) {
    loop {
        if shared.conn.borrow().is_none() {
            info!(endpoint = %shared.endpoint, "Connecting to Redis");
            match shared.client.get_multiplexed_async_connection().await {
                Ok(conn) => {
                    shared.conn.send_replace(Some(conn));
                    info!(endpoint = %shared.endpoint, "Successfully connected to Redis");
                    shared.emit(ConnectionEvent::Connected);
                }
                Err(e) => {
                    warn!(endpoint = %shared.endpoint, error = %e, "Redis connection attempt failed");
                    shared.emit(ConnectionEvent::ConnectFailed {
                        reason: e.to_string(),
                    });
                    tokio::time::sleep(shared.reconnect_interval).await;
                    continue;
                }
            }
        }
        shared.wake.notified().await;
    }
}

/// Mask password in Redis URL for safe logging.
fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos >= scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
