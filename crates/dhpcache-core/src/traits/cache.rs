//! Backend contract shared by every cache backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::result::AppResult;

/// Trait for cache backends (local in-process map or replicated server).
///
/// Values are arbitrary structured data represented as [`serde_json::Value`].
/// An absent entry is `None`.
///
/// Every method has a default body that fails with
/// [`ErrorKind::NotImplemented`](crate::error::ErrorKind::NotImplemented).
/// Concrete backends override all four operations; the defaults exist only so
/// that a backend which forgets one fails loudly instead of silently.
///
/// Concrete backends favor availability: `get`, `set` and `delete` resolve to
/// `None` / `false` on transport failures rather than returning `Err`. Only
/// `clear` propagates a failure, when the key enumeration step itself fails.
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist, has
    /// expired, or could not be read.
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let _ = key;
        Err(AppError::not_implemented("get is not implemented"))
    }

    /// Store a value. `ttl` of `None` (or zero) uses the backend default.
    /// Returns whether the write succeeded.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<bool> {
        let _ = (key, value, ttl);
        Err(AppError::not_implemented("set is not implemented"))
    }

    /// Remove a key, returning the value it held immediately before removal.
    async fn delete(&self, key: &str) -> AppResult<Option<Value>> {
        let _ = key;
        Err(AppError::not_implemented("delete is not implemented"))
    }

    /// Remove every entry.
    async fn clear(&self) -> AppResult<()> {
        Err(AppError::not_implemented("clear is not implemented"))
    }

    /// Get a typed value by deserializing the stored value.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => {
                let parsed = serde_json::from_value(value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing it first.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<bool>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await
    }
}
