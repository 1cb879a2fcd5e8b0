//! # dhpcache-client
//!
//! Cache backends for dhpcache behind one facade:
//!
//! - **local**: in-process expiring map using [moka](https://crates.io/crates/moka)
//! - **replicated**: shared cache server reached through a [`transport`];
//!   Redis via the [redis](https://crates.io/crates/redis) crate, or the
//!   in-process [`MemoryTransport`](transport::MemoryTransport)
//!
//! The backend is selected at runtime based on configuration.

pub mod local;
pub mod provider;
pub mod replicated;
pub mod transport;

pub use dhpcache_core::config::cache::{CacheConfig, CacheType};
pub use dhpcache_core::traits::cache::CacheBackend;
pub use local::LocalCacheClient;
pub use provider::{Backend, Cache, CacheBuilder};
pub use replicated::{Readiness, ReplicatedCacheClient};
