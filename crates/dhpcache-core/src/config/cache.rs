//! Cache backend configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Environment variable supplying the default replicated cache host.
pub const REDIS_HOST_ENV: &str = "REDIS_HOST";
/// Environment variable supplying the default replicated cache port.
pub const REDIS_PORT_ENV: &str = "REDIS_PORT";
/// Environment variable supplying the replicated cache password.
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";

/// Supported cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// In-process expiring map.
    Local,
    /// Networked cache server shared between processes.
    Replicated,
}

impl CacheType {
    /// Converts to the configuration string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Replicated => "replicated",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "replicated" => Ok(Self::Replicated),
            other => Err(AppError::configuration(format!(
                "Unsupported cache type specified: '{other}'. Supported: local, replicated"
            ))),
        }
    }
}

/// Top-level cache configuration.
///
/// `cache_type` stays a plain string so that an unsupported value is
/// rejected when the cache is built, not when the file is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Logical cache name, used to tag log events.
    #[serde(default = "default_name")]
    pub name: String,
    /// Backend type: `"local"` or `"replicated"`.
    #[serde(rename = "type", default = "default_type")]
    pub cache_type: String,
    /// Default TTL for entries in seconds. Each backend has its own
    /// fallback when this is unset or zero.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: Option<u64>,
    /// Replicated backend connection settings.
    #[serde(default)]
    pub replicated: ReplicatedCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            cache_type: default_type(),
            default_ttl_seconds: default_ttl(),
            replicated: ReplicatedCacheConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Configuration for a local cache with the given name.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_type: CacheType::Local.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Configuration for a replicated cache with the given name.
    pub fn replicated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_type: CacheType::Replicated.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Parse the configured backend type.
    pub fn parsed_type(&self) -> Result<CacheType, AppError> {
        self.cache_type.parse()
    }
}

/// Replicated (Redis) backend connection configuration.
///
/// Host, port and password defaults are read from the environment when the
/// value is constructed, and never re-read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatedCacheConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server password.
    #[serde(default = "default_password")]
    pub password: Option<String>,
    /// Whether commands issued while disconnected wait for the connection
    /// instead of failing immediately.
    #[serde(default = "default_true")]
    pub enable_offline_queue: bool,
    /// Longest a queued command waits for a connection before failing,
    /// in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Delay between connection attempts in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// Capacity of the connection event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ReplicatedCacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: default_password(),
            enable_offline_queue: default_true(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_interval_ms: default_reconnect_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ReplicatedCacheConfig {
    /// Build the `redis://` connection URL.
    pub fn redis_url(&self) -> String {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{}:{}/", self.host, self.port)
            }
            _ => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

fn default_name() -> String {
    "default".to_string()
}

fn default_type() -> String {
    CacheType::Local.as_str().to_string()
}

fn default_ttl() -> Option<u64> {
    Some(3600)
}

fn default_host() -> String {
    std::env::var(REDIS_HOST_ENV).unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var(REDIS_PORT_ENV)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379)
}

fn default_password() -> Option<String> {
    std::env::var(REDIS_PASSWORD_ENV).ok()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_reconnect_interval() -> u64 {
    1000
}

fn default_event_buffer() -> usize {
    64
}
