//! Integration tests for backend selection.

mod helpers;

use std::sync::Arc;

use dhpcache_client::transport::MemoryTransport;
use dhpcache_client::{Cache, CacheConfig, CacheType};
use dhpcache_core::config::Settings;
use dhpcache_core::error::ErrorKind;

#[tokio::test]
async fn test_local_type_builds() {
    let cache = Cache::new(&CacheConfig::local("a")).unwrap();
    assert_eq!(cache.cache_type(), CacheType::Local);
}

#[tokio::test]
async fn test_replicated_type_builds() {
    let cache = Cache::builder(CacheConfig::replicated("b"))
        .transport(Arc::new(MemoryTransport::default()))
        .build()
        .unwrap();
    assert_eq!(cache.cache_type(), CacheType::Replicated);
}

#[tokio::test]
async fn test_unsupported_type_fails_and_is_logged() {
    let logger = Arc::new(helpers::RecordingLogger::default());
    let config = CacheConfig {
        cache_type: "Local".to_string(),
        ..CacheConfig::default()
    };

    let err = Cache::builder(config)
        .logger(logger.clone())
        .build()
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Configuration);
    assert!(logger.contains("error", "Cache type of \"Local\" is not supported"));
}

#[tokio::test]
async fn test_default_settings_build_local_cache() {
    let settings = Settings::default();
    let cache = Cache::new(&settings.cache).unwrap();
    assert_eq!(cache.name(), "default");
    assert_eq!(cache.cache_type(), CacheType::Local);
}
