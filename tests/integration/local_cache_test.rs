//! Integration tests for the local backend through the facade.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use dhpcache_client::{Cache, CacheBackend, CacheConfig};

fn local_cache() -> Cache {
    Cache::new(&CacheConfig::local("local-test")).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Credential {
    issuer: String,
    revoked: bool,
    scopes: Vec<String>,
}

#[tokio::test]
async fn test_unwritten_key_is_absent() {
    let cache = local_cache();
    assert_eq!(cache.get("never-written").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_get_delete_scenario() {
    let cache = local_cache();

    assert!(cache.set("123", json!({"foo": "bar"}), None).await.unwrap());
    assert_eq!(cache.get("123").await.unwrap(), Some(json!({"foo": "bar"})));
    assert_eq!(
        cache.delete("123").await.unwrap(),
        Some(json!({"foo": "bar"}))
    );
    assert_eq!(cache.get("123").await.unwrap(), None);
}

#[tokio::test]
async fn test_nested_values_round_trip() {
    let cache = local_cache();
    let value = json!({
        "holder": {"id": 7, "tags": ["a", "b"]},
        "valid": true,
        "score": 0.5,
        "note": null
    });
    cache.set("nested", value.clone(), None).await.unwrap();
    assert_eq!(cache.get("nested").await.unwrap(), Some(value));
}

#[tokio::test]
async fn test_clear_empties_cache() {
    let cache = local_cache();
    let keys = ["a", "b", "c"];
    for key in keys {
        cache.set(key, json!(key), None).await.unwrap();
    }

    cache.clear().await.unwrap();
    for key in keys {
        assert_eq!(cache.get(key).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_typed_helpers() {
    let cache = local_cache();
    let credential = Credential {
        issuer: "health-authority".to_string(),
        revoked: false,
        scopes: vec!["vaccination".to_string()],
    };

    assert!(
        cache
            .set_json("cred", &credential, Some(Duration::from_secs(30)))
            .await
            .unwrap()
    );
    let loaded: Option<Credential> = cache.get_json("cred").await.unwrap();
    assert_eq!(loaded, Some(credential));
}

#[tokio::test]
async fn test_injected_logger_sees_operations() {
    let logger = Arc::new(helpers::RecordingLogger::default());
    let cache = Cache::builder(CacheConfig::local("logged"))
        .logger(logger.clone())
        .build()
        .unwrap();

    cache.set("k", json!(1), None).await.unwrap();
    cache.clear().await.unwrap();

    assert!(logger.contains("info", "Creating local cache instance"));
    assert!(logger.contains("info", "Setting cache entry for key k"));
    assert!(logger.contains("info", "Cache cleared"));
}
