//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use dhpcache_client::transport::{CacheTransport, ConnectionEvent, MemoryTransport, RawValue};
use dhpcache_client::{Cache, CacheConfig, Readiness};
use dhpcache_core::error::AppError;
use dhpcache_core::result::AppResult;
use dhpcache_core::traits::logger::CacheLogger;

/// Logger that keeps every message with its level.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLogger {
    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }
}

impl CacheLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(("info", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(("warn", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(("error", message.to_string()));
    }
}

/// Replicated cache over a [`MemoryTransport`], waited until ready.
pub struct ReplicatedHarness {
    pub cache: Cache,
    pub transport: Arc<MemoryTransport>,
    pub logger: Arc<RecordingLogger>,
}

impl ReplicatedHarness {
    pub async fn ready() -> Self {
        let transport = Arc::new(MemoryTransport::default());
        let logger = Arc::new(RecordingLogger::default());
        let cache = Cache::builder(CacheConfig::replicated("integration"))
            .logger(logger.clone())
            .transport(transport.clone())
            .build()
            .expect("replicated cache builds");
        assert!(cache.wait_ready(Duration::from_secs(1)).await);
        Self {
            cache,
            transport,
            logger,
        }
    }

    /// Wait until the backend reports `state`.
    pub async fn wait_for(&self, state: Readiness) {
        let dhpcache_client::Backend::Replicated(client) = self.cache.backend() else {
            panic!("not a replicated backend");
        };
        let mut rx = client.subscribe_readiness();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|r| *r == state))
            .await
            .expect("readiness change in time")
            .expect("readiness channel open");
    }
}

/// Transport with switchable failures and a fixed store reply.
#[derive(Debug)]
pub struct FaultyTransport {
    pub inner: MemoryTransport,
    pub fail_keys: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub store_reply: Mutex<String>,
    pub calls: AtomicU64,
}

impl FaultyTransport {
    pub fn new() -> Self {
        Self {
            inner: MemoryTransport::default(),
            fail_keys: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            store_reply: Mutex::new("OK".to_string()),
            calls: AtomicU64::new(0),
        }
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheTransport for FaultyTransport {
    async fn fetch(&self, key: &str) -> AppResult<Option<RawValue>> {
        self.count();
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::cache("GET timed out"));
        }
        self.inner.fetch(key).await
    }

    async fn store_with_expiry(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> AppResult<String> {
        self.count();
        self.inner.store_with_expiry(key, ttl_seconds, value).await?;
        Ok(self.store_reply.lock().unwrap().clone())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.count();
        self.inner.remove(key).await
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        self.count();
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(AppError::cache("KEYS is disabled"));
        }
        self.inner.keys(pattern).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.subscribe()
    }

    fn start(&self) {
        self.inner.start();
    }
}
