//! Core traits defined in `dhpcache-core` and implemented by other crates.

pub mod cache;
pub mod logger;

pub use cache::CacheBackend;
pub use logger::{CacheLogger, NoopLogger, TracingLogger};
