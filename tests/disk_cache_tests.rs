//! Integration Tests for the Disk Engine
//!
//! Drives a region through its public API against real files.

use std::fs::OpenOptions;
use std::time::Duration;

use indexed_disk_cache::cache::{CacheElement, CacheKey, GroupId};
use indexed_disk_cache::{DiskCacheConfig, DiskCacheError, IndexedDiskCache};
use tempfile::{tempdir, TempDir};

// == Helper Functions ==

fn open_region() -> (TempDir, DiskCacheConfig, IndexedDiskCache) {
    let dir = tempdir().unwrap();
    let config = DiskCacheConfig::new("region", dir.path());
    let cache = IndexedDiskCache::open(config.clone()).unwrap();
    (dir, config, cache)
}

fn element(key: &str, value: &str) -> CacheElement {
    CacheElement::new("region", CacheKey::name(key), value)
}

async fn value_of(cache: &IndexedDiskCache, key: &str) -> Option<Vec<u8>> {
    cache
        .get(&CacheKey::name(key))
        .await
        .unwrap()
        .map(|element| element.value)
}

async fn data_length(cache: &IndexedDiskCache) -> u64 {
    cache.statistics().await.data_file_length
}

// == Scenario Tests ==

#[tokio::test]
async fn test_removed_slot_is_reused_without_growth() {
    let (_dir, _config, cache) = open_region();
    cache.put(&element("a", "1234")).await.unwrap();
    cache.put(&element("b", "12")).await.unwrap();
    let before = data_length(&cache).await;

    assert!(cache.remove(&CacheKey::name("a")).await);
    cache.put(&element("c", "12")).await.unwrap();

    assert_eq!(data_length(&cache).await, before);
    assert_eq!(cache.statistics().await.recycle_count, 1);
    assert_eq!(value_of(&cache, "a").await, None);
    assert_eq!(value_of(&cache, "b").await, Some(b"12".to_vec()));
    assert_eq!(value_of(&cache, "c").await, Some(b"12".to_vec()));
}

#[tokio::test]
async fn test_round_trip_keeps_attributes() {
    let (_dir, _config, cache) = open_region();
    let group_key = CacheKey::group(GroupId::new("region", "user1"), "name");
    let stored = CacheElement::new("region", group_key.clone(), vec![0u8, 159, 146, 150]);

    cache.put(&stored).await.unwrap();
    assert_eq!(cache.get(&group_key).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn test_eviction_slot_reused_immediately() {
    let dir = tempdir().unwrap();
    let mut config = DiskCacheConfig::new("region", dir.path());
    config.max_key_size = 2;
    let cache = IndexedDiskCache::open(config).unwrap();

    cache.put(&element("a", "1")).await.unwrap();
    cache.put(&element("b", "2")).await.unwrap();
    cache.put(&element("c", "3")).await.unwrap();
    assert_eq!(cache.size().await, 2);
    assert_eq!(value_of(&cache, "a").await, None);
    let before = data_length(&cache).await;

    cache.put(&element("d", "4")).await.unwrap();
    assert_eq!(data_length(&cache).await, before);
    assert_eq!(value_of(&cache, "d").await, Some(b"4".to_vec()));
}

// == Restart Tests ==

#[tokio::test]
async fn test_region_survives_restart() {
    let (_dir, config, cache) = open_region();
    cache.put(&element("kept", "value")).await.unwrap();
    cache.dispose().await.unwrap();

    let reopened = IndexedDiskCache::open(config).unwrap();
    assert_eq!(value_of(&reopened, "kept").await, Some(b"value".to_vec()));
}

#[tokio::test]
async fn test_truncated_data_file_resets_on_open() {
    let (_dir, config, cache) = open_region();
    cache.put(&element("a", "some value")).await.unwrap();
    cache.put(&element("b", "another value")).await.unwrap();
    cache.save_keys().await.unwrap();
    drop(cache);

    let data = OpenOptions::new()
        .write(true)
        .open(config.data_file_path())
        .unwrap();
    data.set_len(10).unwrap();
    drop(data);

    let reopened = IndexedDiskCache::open(config).unwrap();
    assert_eq!(reopened.size().await, 0);
    assert_eq!(data_length(&reopened).await, 0);
}

// == Compaction Tests ==

#[tokio::test]
async fn test_compaction_twice_no_growth() {
    let (_dir, _config, cache) = open_region();
    for i in 0..30 {
        cache
            .put(&element(&format!("k{}", i), &"v".repeat(i + 1)))
            .await
            .unwrap();
    }
    for i in (0..30).step_by(3) {
        cache.remove(&CacheKey::name(format!("k{}", i))).await;
    }

    cache.optimize().unwrap().await.unwrap();
    let first = data_length(&cache).await;
    cache.optimize().unwrap().await.unwrap();

    assert!(data_length(&cache).await <= first);
    for i in (0..30).filter(|i| i % 3 != 0) {
        let expected = "v".repeat(i + 1).into_bytes();
        assert_eq!(value_of(&cache, &format!("k{}", i)).await, Some(expected));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_during_compaction() {
    let (_dir, _config, cache) = open_region();
    for i in 0..300 {
        cache
            .put(&element(&format!("k{}", i), &format!("value-{}", i)))
            .await
            .unwrap();
    }
    for i in (0..300).step_by(2) {
        cache.remove(&CacheKey::name(format!("k{}", i))).await;
    }

    let compaction = cache.optimize().unwrap();
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let found = cache.get(&CacheKey::name("k151")).await.unwrap();
                    assert_eq!(found.unwrap().value, b"value-151");
                }
            })
        })
        .collect();

    for reader in readers {
        reader.await.unwrap();
    }
    compaction.await.unwrap();
    assert_eq!(cache.size().await, 150);
}

// == Lifecycle Tests ==

#[tokio::test]
async fn test_dispose_rejects_later_puts() {
    let (_dir, _config, cache) = open_region();
    cache.dispose().await.unwrap();

    assert!(!cache.is_alive());
    let result = cache.put(&element("late", "value")).await;
    assert!(matches!(result, Err(DiskCacheError::NotAlive(_))));
    assert_eq!(value_of(&cache, "late").await, None);
}

#[tokio::test]
async fn test_dispose_timeout_marks_dead() {
    let dir = tempdir().unwrap();
    let mut config = DiskCacheConfig::new("region", dir.path());
    config.dispose_timeout_secs = 0;
    let cache = IndexedDiskCache::open(config).unwrap();
    for i in 0..50 {
        cache.put(&element(&format!("k{}", i), "value")).await.unwrap();
    }

    cache.dispose().await.unwrap();
    assert!(!cache.is_alive());

    // The detached dispose task still finishes on its own
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!cache.is_optimizing());
}
