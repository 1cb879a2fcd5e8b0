//! Cache facade that dispatches to the configured backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use dhpcache_core::config::cache::{CacheConfig, CacheType, ReplicatedCacheConfig};
use dhpcache_core::result::AppResult;
use dhpcache_core::traits::cache::CacheBackend;
use dhpcache_core::traits::logger::{CacheLogger, TracingLogger};

use crate::local::LocalCacheClient;
use crate::replicated::{Readiness, ReplicatedCacheClient};
use crate::transport::CacheTransport;

/// The backend selected at construction.
#[derive(Debug)]
pub enum Backend {
    /// In-process cache.
    Local(LocalCacheClient),
    /// Shared cache server.
    Replicated(ReplicatedCacheClient),
}

impl Backend {
    /// The backend's type.
    pub fn cache_type(&self) -> CacheType {
        match self {
            Self::Local(_) => CacheType::Local,
            Self::Replicated(_) => CacheType::Replicated,
        }
    }

    /// Connection readiness. Local backends are always ready.
    pub fn readiness(&self) -> Readiness {
        match self {
            Self::Local(_) => Readiness::Ready,
            Self::Replicated(client) => client.readiness(),
        }
    }
}

#[async_trait]
impl CacheBackend for Backend {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        match self {
            Self::Local(client) => client.get(key).await,
            Self::Replicated(client) => client.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<bool> {
        match self {
            Self::Local(client) => client.set(key, value, ttl).await,
            Self::Replicated(client) => client.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> AppResult<Option<Value>> {
        match self {
            Self::Local(client) => client.delete(key).await,
            Self::Replicated(client) => client.delete(key).await,
        }
    }

    async fn clear(&self) -> AppResult<()> {
        match self {
            Self::Local(client) => client.clear().await,
            Self::Replicated(client) => client.clear().await,
        }
    }
}

/// Uniform cache entry point.
///
/// The backend is selected once from [`CacheConfig`]; callers only see
/// [`CacheBackend`] operations.
#[derive(Debug)]
pub struct Cache {
    name: String,
    backend: Backend,
}

impl Cache {
    /// Create a cache from configuration with the default logger.
    ///
    /// A replicated cache must be created within a Tokio runtime.
    pub fn new(config: &CacheConfig) -> AppResult<Self> {
        Self::builder(config.clone()).build()
    }

    /// Start building a cache with an injected logger or transport.
    pub fn builder(config: CacheConfig) -> CacheBuilder {
        CacheBuilder {
            config,
            logger: None,
            transport: None,
        }
    }

    /// Wrap an existing backend (for testing).
    pub fn from_backend(name: impl Into<String>, backend: Backend) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// Logical cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The selected backend type.
    pub fn cache_type(&self) -> CacheType {
        self.backend.cache_type()
    }

    /// The selected backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Whether operations will reach the backend.
    pub fn is_ready(&self) -> bool {
        self.backend.readiness() == Readiness::Ready
    }

    /// Wait until the backend is ready, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        match &self.backend {
            Backend::Local(_) => true,
            Backend::Replicated(client) => client.wait_ready(timeout).await,
        }
    }
}

#[async_trait]
impl CacheBackend for Cache {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        self.backend.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<bool> {
        self.backend.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<Option<Value>> {
        self.backend.delete(key).await
    }

    async fn clear(&self) -> AppResult<()> {
        self.backend.clear().await
    }
}

/// Builder for [`Cache`].
#[derive(Debug)]
pub struct CacheBuilder {
    config: CacheConfig,
    logger: Option<Arc<dyn CacheLogger>>,
    transport: Option<Arc<dyn CacheTransport>>,
}

impl CacheBuilder {
    /// Use this logger instead of a [`TracingLogger`] named after the cache.
    pub fn logger(mut self, logger: Arc<dyn CacheLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use a pre-built transport for the replicated backend instead of
    /// connecting to the configured server.
    pub fn transport(mut self, transport: Arc<dyn CacheTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Select and create the backend.
    ///
    /// Fails with a configuration error when the type is unsupported. Without
    /// an injected logger, the backend logs through a child of the cache's
    /// [`TracingLogger`], sharing its correlation id.
    pub fn build(self) -> AppResult<Cache> {
        let config = self.config;
        let root = TracingLogger::new(config.name.clone());
        let logger: Arc<dyn CacheLogger> = match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => Arc::new(root.clone()),
        };
        let client_logger = |component: &str| -> Arc<dyn CacheLogger> {
            match &self.logger {
                Some(logger) => Arc::clone(logger),
                None => Arc::new(component_logger(&root, component)),
            }
        };

        let cache_type = config.parsed_type().inspect_err(|_| {
            logger.error(&format!(
                "Cache type of \"{}\" is not supported",
                config.cache_type
            ));
        })?;

        let backend = match cache_type {
            CacheType::Local => {
                logger.info("Creating local cache instance...");
                Backend::Local(LocalCacheClient::new(
                    config.default_ttl_seconds,
                    client_logger("LocalCacheClient"),
                ))
            }
            CacheType::Replicated => {
                logger.info("Creating client for replicated cache...");
                let transport = match self.transport {
                    Some(transport) => transport,
                    None => default_transport(&config.replicated)?,
                };
                Backend::Replicated(ReplicatedCacheClient::new(
                    transport,
                    config.default_ttl_seconds,
                    client_logger("ReplicatedCacheClient"),
                )?)
            }
        };

        Ok(Cache {
            name: config.name,
            backend,
        })
    }
}

/// Logger for a backend component, named `<cache>.<component>`.
fn component_logger(root: &TracingLogger, component: &str) -> TracingLogger {
    root.child(format!("{}.{component}", root.name()))
}

#[cfg(feature = "redis-backend")]
fn default_transport(config: &ReplicatedCacheConfig) -> AppResult<Arc<dyn CacheTransport>> {
    Ok(Arc::new(crate::transport::RedisTransport::new(config)?))
}

#[cfg(not(feature = "redis-backend"))]
fn default_transport(_config: &ReplicatedCacheConfig) -> AppResult<Arc<dyn CacheTransport>> {
    Err(dhpcache_core::error::AppError::configuration(
        "Replicated cache needs a transport: enable the redis-backend feature or inject one",
    ))
}
