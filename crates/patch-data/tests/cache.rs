//! Tests for cache-aside user lookups.

mod common;
use common::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use patch_data::{CacheClient, CacheError, MemoryCache, User, UserError};

/// Fails every call and counts them.
#[derive(Default)]
struct DownCache {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheClient for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

async fn cached_user(cache: &MemoryCache, key: &str) -> Option<User> {
    let text = cache.get(key).await.unwrap()?;
    Some(serde_json::from_str(&text).unwrap())
}

#[tokio::test]
async fn create_populates_all_keys() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();

    let ada = users.create("ada", "ada@example.com", "pw").await.unwrap();
    db.cache().unwrap().flush().await;

    let id_key = format!("user_{}", ada.id());
    for key in ["user_ada", "user_ada@example.com", id_key.as_str()] {
        assert_eq!(cached_user(&cache, key).await.as_ref(), Some(&ada), "{key}");
    }
}

#[tokio::test]
async fn reads_are_served_from_cache() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();
    let ada = users.create("ada", "ada@example.com", "pw").await.unwrap();
    db.cache().unwrap().flush().await;

    // Remove the row behind the cache's back.
    db.delete("users", None).await.unwrap();

    assert_eq!(users.get_by_name("ada").await.unwrap(), ada);
    assert_eq!(users.get_by_id(ada.id()).await.unwrap().id(), ada.id());
}

#[tokio::test]
async fn delete_evicts_keys() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();
    let ada = users.create("ada", "ada@example.com", "pw").await.unwrap();

    users.delete_by_name("ada").await.unwrap();
    db.cache().unwrap().flush().await;

    assert!(cache.is_empty().await);
    assert!(matches!(
        users.get_by_id(ada.id()).await,
        Err(UserError::NoUser)
    ));
}

#[tokio::test]
async fn update_replaces_stale_keys() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();
    let ada = users.create("ada", "ada@example.com", "pw").await.unwrap();

    let renamed = users
        .update(&ada, patch_data::UserPatch::default().name("countess"))
        .await
        .unwrap();
    db.cache().unwrap().flush().await;

    assert_eq!(cached_user(&cache, "user_ada").await, None);
    assert_eq!(
        cached_user(&cache, "user_countess").await.as_ref(),
        Some(&renamed)
    );
    assert_eq!(
        cached_user(&cache, &format!("user_{}", ada.id())).await.as_ref(),
        Some(&renamed)
    );
    assert_eq!(users.get_by_name("countess").await.unwrap(), renamed);
}

#[tokio::test]
async fn colliding_keys_fall_back_to_store() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();

    // A's name is B's e-mail, and C's name is A's id.
    let a = users.create("x@y.z", "a@a.a", "pw").await.unwrap();
    let b = users.create("b", "x@y.z", "pw").await.unwrap();
    let c = users
        .create(&a.id().to_string(), "c@c.c", "pw")
        .await
        .unwrap();
    db.cache().unwrap().flush().await;

    assert_eq!(users.get_by_name("x@y.z").await.unwrap(), a);
    assert_eq!(users.get_by_email("x@y.z").await.unwrap(), b);
    assert_eq!(users.get_by_id(a.id()).await.unwrap(), a);
    assert_eq!(users.get_by_name(&a.id().to_string()).await.unwrap(), c);

    db.cache().unwrap().flush().await;
    assert_eq!(users.get_by_name("x@y.z").await.unwrap(), a);
    assert_eq!(users.get_by_id(a.id()).await.unwrap(), a);
}

#[tokio::test]
async fn failing_cache_does_not_fail_operations() {
    let cache = Arc::new(DownCache::default());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();

    let ada = users.create("ada", "ada@example.com", "pw").await.unwrap();
    assert_eq!(users.get_by_name("ada").await.unwrap(), ada);
    users.authenticate("ada", "pw").await.unwrap();
    users.delete_by_id(ada.id()).await.unwrap();

    let writer = db.cache().unwrap();
    writer.flush().await;
    assert_eq!(writer.pending(), 0);
    assert!(cache.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn close_drains_queue() {
    let cache = Arc::new(MemoryCache::new());
    let db = test_db_with_cache(cache.clone()).await;
    let users = db.users();
    users.create_table().await.unwrap();
    users.create("ada", "ada@example.com", "pw").await.unwrap();

    db.close().await;
    assert_eq!(cache.len().await, 3);
}
