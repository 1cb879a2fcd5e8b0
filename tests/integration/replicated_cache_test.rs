//! Integration tests for the replicated backend through the facade.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use dhpcache_client::transport::{CacheTransport, ConnectionEvent, MemoryTransport};
use dhpcache_client::{Backend, Cache, CacheBackend, CacheConfig, Readiness, ReplicatedCacheClient};
use dhpcache_core::error::ErrorKind;
use dhpcache_core::traits::logger::NoopLogger;

use helpers::{FaultyTransport, RecordingLogger, ReplicatedHarness};

#[tokio::test]
async fn test_unwritten_key_is_absent() {
    let h = ReplicatedHarness::ready().await;
    assert_eq!(h.cache.get("never-written").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_get_delete_scenario() {
    let h = ReplicatedHarness::ready().await;

    assert!(h.cache.set("123", json!({"foo": "bar"}), None).await.unwrap());
    assert_eq!(h.cache.get("123").await.unwrap(), Some(json!({"foo": "bar"})));
    assert_eq!(
        h.cache.delete("123").await.unwrap(),
        Some(json!({"foo": "bar"}))
    );
    assert_eq!(h.cache.get("123").await.unwrap(), None);
}

#[tokio::test]
async fn test_base64_looking_string_round_trips_unchanged() {
    let h = ReplicatedHarness::ready().await;
    let token = json!("u4AtF3KFc6oJP6STeXVWvw==");

    assert!(h.cache.set("123", token.clone(), None).await.unwrap());
    assert_eq!(h.cache.get("123").await.unwrap(), Some(token));
}

#[tokio::test]
async fn test_foreign_plain_text_is_returned_verbatim() {
    let h = ReplicatedHarness::ready().await;
    h.transport
        .insert_raw("legacy", "not {json} at all", Duration::from_secs(60))
        .unwrap();

    assert_eq!(
        h.cache.get("legacy").await.unwrap(),
        Some(json!("not {json} at all"))
    );
}

#[tokio::test]
async fn test_clear_empties_cache() {
    let h = ReplicatedHarness::ready().await;
    for i in 0..20 {
        h.cache
            .set(&format!("key:{i}"), json!({"n": i}), None)
            .await
            .unwrap();
    }

    h.cache.clear().await.unwrap();
    assert!(h.transport.is_empty());
    for i in 0..20 {
        assert_eq!(h.cache.get(&format!("key:{i}")).await.unwrap(), None);
    }
    assert!(h.logger.contains("info", "Successfully cleared cache"));
}

#[tokio::test]
async fn test_not_ready_makes_no_transport_calls() {
    let transport = Arc::new(MemoryTransport::default());
    transport.start();
    let client = ReplicatedCacheClient::detached(transport.clone(), None, Arc::new(NoopLogger));
    let cache = Cache::from_backend("detached", Backend::Replicated(client));

    assert!(!cache.is_ready());
    assert_eq!(cache.get("123").await.unwrap(), None);
    assert!(!cache.set("123", json!({"foo": "bar"}), None).await.unwrap());
    assert_eq!(transport.command_count(), 0);
}

#[tokio::test]
async fn test_connection_loss_and_recovery() {
    let h = ReplicatedHarness::ready().await;
    h.cache.set("k", json!("v"), None).await.unwrap();

    h.transport.simulate_connection_lost("connection reset by peer");
    h.wait_for(Readiness::NotReady).await;
    let before = h.transport.command_count();
    assert_eq!(h.cache.get("k").await.unwrap(), None);
    assert!(!h.cache.set("k", json!("w"), None).await.unwrap());
    assert_eq!(h.transport.command_count(), before);
    assert!(h.logger.contains("warn", "Not ready to read from cache"));
    assert!(h.logger.contains("warn", "Connection to remote cache lost"));

    h.transport.simulate_reconnect();
    h.wait_for(Readiness::Ready).await;
    assert_eq!(h.cache.get("k").await.unwrap(), Some(json!("v")));
}

#[tokio::test]
async fn test_failed_connect_keeps_not_ready() {
    let transport = Arc::new(MemoryTransport::default());
    let logger = Arc::new(RecordingLogger::default());
    let client = ReplicatedCacheClient::detached(transport, None, logger.clone());

    let state = client.handle_event(&ConnectionEvent::ConnectFailed {
        reason: "connection refused".to_string(),
    });
    assert_eq!(state, Readiness::NotReady);
    assert!(logger.contains("warn", "Could not connect to remote cache"));
}

#[tokio::test]
async fn test_non_ok_store_reply_resolves_false() {
    let transport = Arc::new(FaultyTransport::new());
    *transport.store_reply.lock().unwrap() = "QUEUED".to_string();
    let cache = Cache::builder(CacheConfig::replicated("faulty"))
        .logger(Arc::new(NoopLogger))
        .transport(transport.clone())
        .build()
        .unwrap();
    assert!(cache.wait_ready(Duration::from_secs(1)).await);

    assert!(!cache.set("k", json!(1), None).await.unwrap());
}

#[tokio::test]
async fn test_fetch_error_reads_as_absent() {
    let transport = Arc::new(FaultyTransport::new());
    let logger = Arc::new(RecordingLogger::default());
    let cache = Cache::builder(CacheConfig::replicated("faulty"))
        .logger(logger.clone())
        .transport(transport.clone())
        .build()
        .unwrap();
    assert!(cache.wait_ready(Duration::from_secs(1)).await);

    cache.set("k", json!(1), None).await.unwrap();
    transport.fail_fetch.store(true, Ordering::SeqCst);
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(logger.contains("error", "Failed to get cache entry for key k"));

    // The entry is still removed even though the pre-read failed.
    assert_eq!(cache.delete("k").await.unwrap(), None);
    transport.fail_fetch.store(false, Ordering::SeqCst);
    assert_eq!(cache.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_propagates_enumeration_failure() {
    let transport = Arc::new(FaultyTransport::new());
    let cache = Cache::builder(CacheConfig::replicated("faulty"))
        .logger(Arc::new(NoopLogger))
        .transport(transport.clone())
        .build()
        .unwrap();
    assert!(cache.wait_ready(Duration::from_secs(1)).await);

    cache.set("k", json!(1), None).await.unwrap();
    transport.fail_keys.store(true, Ordering::SeqCst);

    let err = cache.clear().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cache);
    assert_eq!(cache.get("k").await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_oversized_ttl_resolves_false() {
    let h = ReplicatedHarness::ready().await;
    let ok = h
        .cache
        .set("k", json!(1), Some(Duration::from_secs(u64::MAX)))
        .await
        .unwrap();
    assert!(!ok);
    assert!(h.logger.contains("error", "Failed to set cache entry for key k"));
    assert_eq!(h.cache.get("k").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_ttl_is_honored() {
    let h = ReplicatedHarness::ready().await;

    assert!(
        h.cache
            .set("k", json!(1), Some(Duration::from_millis(500)))
            .await
            .unwrap()
    );
    assert!(h.logger.contains("info", "with ttl of 1s"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(h.cache.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_configured_default_ttl_is_used() {
    let transport = Arc::new(MemoryTransport::default());
    let config = CacheConfig {
        default_ttl_seconds: Some(1),
        ..CacheConfig::replicated("short-lived")
    };
    let cache = Cache::builder(config)
        .logger(Arc::new(NoopLogger))
        .transport(transport.clone())
        .build()
        .unwrap();
    assert!(cache.wait_ready(Duration::from_secs(1)).await);

    cache.set("k", json!(1), None).await.unwrap();
    let Backend::Replicated(client) = cache.backend() else {
        panic!("expected replicated backend");
    };
    assert_eq!(client.default_ttl(), Duration::from_secs(1));
    assert_eq!(client.transport().endpoint(), "memory");
}
