//! In-process transport for single-node setups and tests.
//!
//! Behaves like a cache server reached over a connection: entries expire,
//! `keys` accepts glob patterns, and the connection can be dropped and
//! restored on demand, emitting the same lifecycle events a real server
//! connection would.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};

use dhpcache_core::error::AppError;
use dhpcache_core::result::AppResult;

use super::{CacheTransport, ConnectionEvent, RawValue, STORE_OK};

#[derive(Debug, Clone)]
struct StoredValue {
    payload: String,
    expires_at: Instant,
}

/// In-memory implementation of [`CacheTransport`].
#[derive(Debug)]
pub struct MemoryTransport {
    /// Stored payloads keyed by cache key.
    data: DashMap<String, StoredValue>,
    /// Whether the simulated connection is up.
    connected: AtomicBool,
    /// Number of commands received (fetch, store, remove, keys).
    commands: AtomicU64,
    /// Lifecycle event channel.
    events: broadcast::Sender<ConnectionEvent>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MemoryTransport {
    /// Create a disconnected transport. It connects on [`CacheTransport::start`].
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            data: DashMap::new(),
            connected: AtomicBool::new(false),
            commands: AtomicU64::new(0),
            events,
        }
    }

    /// Drop the simulated connection and announce a reconnect.
    pub fn simulate_connection_lost(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit(ConnectionEvent::Reconnecting {
            reason: reason.to_string(),
        });
    }

    /// Restore the simulated connection.
    pub fn simulate_reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.emit(ConnectionEvent::Connected);
    }

    /// Publish an arbitrary lifecycle event.
    pub fn emit(&self, event: ConnectionEvent) {
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
    }

    /// Whether the simulated connection is up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of commands received so far.
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| e.expires_at > now).count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a payload directly, bypassing the command path.
    ///
    /// Fails when `ttl` reaches past what the clock can represent.
    pub fn insert_raw(&self, key: &str, payload: &str, ttl: Duration) -> AppResult<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| AppError::cache("invalid expire time"))?;
        self.data.insert(
            key.to_string(),
            StoredValue {
                payload: payload.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn command(&self, name: &str) -> AppResult<()> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        if self.is_connected() {
            Ok(())
        } else {
            Err(AppError::service_unavailable(format!(
                "{name} failed: connection is not available"
            )))
        }
    }
}

#[async_trait]
impl CacheTransport for MemoryTransport {
    async fn fetch(&self, key: &str) -> AppResult<Option<RawValue>> {
        self.command("GET")?;
        let now = Instant::now();
        let expired = match self.data.get(key) {
            Some(entry) if entry.expires_at > now => {
                return Ok(Some(RawValue::Text(entry.payload.clone())));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.data.remove(key);
        }
        Ok(None)
    }

    async fn store_with_expiry(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> AppResult<String> {
        self.command("SETEX")?;
        if ttl_seconds == 0 {
            return Err(AppError::cache("invalid expire time in 'setex' command"));
        }
        self.insert_raw(key, value, Duration::from_secs(ttl_seconds))?;
        Ok(STORE_OK.to_string())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.command("DEL")?;
        self.data.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        self.command("KEYS")?;
        let now = Instant::now();
        Ok(self
            .data
            .iter()
            .filter(|e| e.expires_at > now && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    fn start(&self) {
        self.simulate_reconnect();
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// Glob match supporting `*` (any run) and `?` (any single character).
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
