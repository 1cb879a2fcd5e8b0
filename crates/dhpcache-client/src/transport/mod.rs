//! Transports to a shared cache server.
//!
//! The replicated backend never talks to a socket directly. It drives a
//! [`CacheTransport`], which owns the connection, speaks the wire protocol,
//! and reports connection lifecycle changes as [`ConnectionEvent`]s.

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use dhpcache_core::result::AppResult;

pub use memory::MemoryTransport;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisTransport;

/// Status reply the server sends for a successful store.
pub const STORE_OK: &str = "OK";

/// Raw payload returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// A textual payload.
    Text(String),
    /// A binary payload.
    Bytes(Vec<u8>),
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Connection lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection is established and usable.
    Connected,
    /// A connection attempt failed.
    ConnectFailed {
        /// Failure description.
        reason: String,
    },
    /// The connection was lost and the transport is reconnecting.
    Reconnecting {
        /// Why the connection was lost.
        reason: String,
    },
    /// The connection was closed.
    Disconnected {
        /// Why the connection was closed.
        reason: String,
    },
    /// A transport-level error that does not by itself change connectivity.
    Error {
        /// Error description.
        reason: String,
    },
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::ConnectFailed { reason } => write!(f, "connect failed: {reason}"),
            Self::Reconnecting { reason } => write!(f, "reconnecting: {reason}"),
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
            Self::Error { reason } => write!(f, "error: {reason}"),
        }
    }
}

/// Connection to a shared cache server.
#[async_trait]
pub trait CacheTransport: Send + Sync + fmt::Debug + 'static {
    /// Fetch the raw payload stored under `key`.
    async fn fetch(&self, key: &str) -> AppResult<Option<RawValue>>;

    /// Store `value` under `key`, expiring after `ttl_seconds`. Returns the
    /// server's status reply ([`STORE_OK`] on success).
    async fn store_with_expiry(&self, key: &str, ttl_seconds: u64, value: &str)
    -> AppResult<String>;

    /// Remove `key`.
    async fn remove(&self, key: &str) -> AppResult<()>;

    /// List keys matching a glob-style `pattern`.
    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>>;

    /// Subscribe to connection lifecycle notifications.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Begin connecting. Called once, after the owner has subscribed, so no
    /// lifecycle notification is missed.
    fn start(&self) {}

    /// Endpoint description for log messages (`host:port`).
    fn endpoint(&self) -> String {
        "unknown".to_string()
    }
}
