//! Replicated cache backend: a shared cache server reached through a
//! [`CacheTransport`](crate::transport::CacheTransport).

pub mod codec;
pub mod operations;
pub mod readiness;

pub use operations::ReplicatedCacheClient;
pub use readiness::Readiness;
