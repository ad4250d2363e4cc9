//! 响应缓存测试
//!
//! 时间相关的用例都在暂停的 tokio 时钟下运行

use std::sync::Arc;
use std::time::Duration;

use super::{CacheEntry, ResponseCache};

#[tokio::test(start_paused = true)]
async fn test_get_before_and_after_ttl() {
    let cache = ResponseCache::new(Duration::from_secs(600));
    cache.set("k", "v".to_string(), Some(Duration::from_millis(100))).await;

    assert_eq!(cache.get("k").await.as_deref(), Some("v"));

    tokio::time::advance(Duration::from_millis(101)).await;
    let size_before = cache.size().await;
    assert_eq!(cache.get("k").await, None);
    // 读取时惰性移除
    assert_eq!(cache.size().await, size_before - 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_ttl_applies() {
    let cache = ResponseCache::new(Duration::from_secs(10));
    cache.set("k", 1u32, None).await;

    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(cache.has("k").await);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!cache.has("k").await);
}

#[tokio::test]
async fn test_set_replaces_existing_entry() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    cache.set("k", "old".to_string(), None).await;
    cache.set("k", "new".to_string(), None).await;

    assert_eq!(cache.size().await, 1);
    assert_eq!(cache.get("k").await.as_deref(), Some("new"));
}

#[tokio::test(start_paused = true)]
async fn test_set_refreshes_expiry() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    cache.set("k", 1u8, Some(Duration::from_millis(50))).await;
    tokio::time::advance(Duration::from_millis(40)).await;
    cache.set("k", 2u8, Some(Duration::from_millis(50))).await;
    tokio::time::advance(Duration::from_millis(40)).await;

    assert_eq!(cache.get("k").await, Some(2));
}

#[tokio::test]
async fn test_clear_and_missing_key() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    assert_eq!(cache.get("nope").await, None::<String>);

    cache.set("a", "1".to_string(), None).await;
    cache.set("b", "2".to_string(), None).await;
    assert_eq!(cache.size().await, 2);

    cache.clear().await;
    assert_eq!(cache.size().await, 0);
    assert!(!cache.has("a").await);
}

#[tokio::test(start_paused = true)]
async fn test_size_counts_unswept_expired_entries() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    cache.set("a", 1u8, Some(Duration::from_millis(10))).await;
    cache.set("b", 2u8, None).await;
    tokio::time::advance(Duration::from_millis(20)).await;

    assert_eq!(cache.size().await, 2);
    assert_eq!(cache.prune_expired().await, 1);
    assert_eq!(cache.size().await, 1);
    assert!(cache.has("b").await);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_drains_unread_entries() {
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(600)));
    for i in 0..25 {
        cache.set(format!("chat-{}", i), i, Some(Duration::from_secs(1))).await;
    }
    assert_eq!(cache.size().await, 25);

    let sweep_interval = Duration::from_secs(300);
    let handle = cache.spawn_sweeper(sweep_interval);

    tokio::time::sleep(sweep_interval + Duration::from_secs(1)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(cache.size().await, 0);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_keeps_live_entries() {
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(600)));
    cache.set("short", 1u8, Some(Duration::from_secs(1))).await;
    cache.set("long", 2u8, Some(Duration::from_secs(3600))).await;

    let handle = cache.spawn_sweeper(Duration::from_secs(300));
    tokio::time::sleep(Duration::from_secs(301)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(cache.size().await, 1);
    assert_eq!(cache.get("long").await, Some(2));
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_exits_when_cache_dropped() {
    let cache = Arc::new(ResponseCache::<u8>::new(Duration::from_secs(60)));
    let handle = cache.spawn_sweeper(Duration::from_secs(1));
    drop(cache);

    tokio::time::sleep(Duration::from_secs(2)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_entry_remaining_ttl() {
    let entry = CacheEntry::new("x", Duration::from_secs(5));
    assert!(!entry.is_expired());
    assert_eq!(entry.remaining_ttl(), Some(Duration::from_secs(5)));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(entry.is_expired());
    assert_eq!(entry.remaining_ttl(), None);
}
