//! # dhpcache-core
//!
//! Core crate for dhpcache. Contains the backend contract every cache
//! backend implements, the injectable logger capability, configuration
//! schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other dhpcache crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
