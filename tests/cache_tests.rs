//! Cache tests: embedded store, freshness policy, snapshot/reload, destination admission.

use filecolly::backend::cache::parse_snapshot;
use filecolly::backend::{
    CacheStore, DedupCache, DestSender, MemoryCacheStore, MemoryQueue, QueueBackend,
    SqliteCacheStore,
};
use filecolly::error::CollectError;
use filecolly::pipeline::{Sighting, classify};
use filecolly::utils::Logger;
use std::fs;
use std::path::Path;

fn sqlite_store(dir: &Path) -> SqliteCacheStore {
    SqliteCacheStore::open(&dir.join("cache.db"), "fscacher").unwrap()
}

fn memory_cache() -> DedupCache {
    DedupCache::new(Box::new(MemoryCacheStore::new()))
}

fn sender_with(queue: &MemoryQueue, limit: i64) -> DestSender {
    DestSender::new(Box::new(queue.clone()), limit)
}

// --- embedded store ---

#[test]
fn test_sqlite_record_lookup_remove() {
    let tmp = tempfile::tempdir().unwrap();
    let store = sqlite_store(tmp.path());
    assert_eq!(store.lookup("/a").unwrap(), None);

    store.record("/a", 100).unwrap();
    assert_eq!(store.lookup("/a").unwrap(), Some(100));

    // upsert
    store.record("/a", 200).unwrap();
    store.record("/a", 200).unwrap();
    assert_eq!(store.lookup("/a").unwrap(), Some(200));
    assert_eq!(store.entries().unwrap().len(), 1);

    store.remove("/a").unwrap();
    store.remove("/a").unwrap();
    assert_eq!(store.lookup("/a").unwrap(), None);
}

#[test]
fn test_sqlite_persists_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    sqlite_store(tmp.path()).record("/kept", 42).unwrap();
    let reopened = sqlite_store(tmp.path());
    assert_eq!(reopened.lookup("/kept").unwrap(), Some(42));
}

#[test]
fn test_sqlite_namespaces_are_separate() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("cache.db");
    let a = SqliteCacheStore::open(&db, "bucket_a").unwrap();
    let b = SqliteCacheStore::open(&db, "bucket_b").unwrap();
    a.record("/x", 1).unwrap();
    assert_eq!(b.lookup("/x").unwrap(), None);
}

#[test]
fn test_sqlite_rejects_bad_namespace() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(SqliteCacheStore::open(&tmp.path().join("c.db"), "bad; DROP").is_err());
    assert!(SqliteCacheStore::open(&tmp.path().join("c.db"), "").is_err());
}

#[test]
fn test_sqlite_record_many() {
    let tmp = tempfile::tempdir().unwrap();
    let store = sqlite_store(tmp.path());
    let entries: Vec<(String, i64)> = (0..100).map(|i| (format!("/f{i}"), i)).collect();
    store.record_many(&entries).unwrap();
    assert_eq!(store.entries().unwrap().len(), 100);
    assert_eq!(store.lookup("/f57").unwrap(), Some(57));
}

// --- freshness ---

#[test]
fn test_is_fresh_monotonic_in_time() {
    let cache = memory_cache();
    let (t, ttl) = (1_000, 10);
    cache.record("/p", t).unwrap();
    for now in (t - 5)..(t + ttl) {
        assert!(cache.is_fresh("/p", ttl, now), "fresh at {now}");
    }
    for now in (t + ttl)..(t + ttl + 20) {
        assert!(!cache.is_fresh("/p", ttl, now), "stale at {now}");
    }
    assert!(!cache.is_fresh("/missing", ttl, t));
}

#[test]
fn test_classify_sightings() {
    let cache = memory_cache();
    let p = Path::new("/data/f.txt");
    let log = Logger::default();
    assert_eq!(classify(&cache, p, 10, 0, &log), Sighting::Unseen);
    cache.record("/data/f.txt", 0).unwrap();
    assert_eq!(classify(&cache, p, 10, 5, &log), Sighting::Fresh);
    assert_eq!(classify(&cache, p, 10, 10, &log), Sighting::Expired);
    assert_eq!(classify(&cache, p, 10, 15, &log), Sighting::Expired);
}

struct BrokenStore;

impl CacheStore for BrokenStore {
    fn lookup(&self, _key: &str) -> filecolly::CollectResult<Option<i64>> {
        Err(CollectError::CacheIo("disk gone".into()))
    }
    fn record(&self, _key: &str, _timestamp: i64) -> filecolly::CollectResult<()> {
        Err(CollectError::CacheIo("disk gone".into()))
    }
    fn remove(&self, _key: &str) -> filecolly::CollectResult<()> {
        Err(CollectError::CacheIo("disk gone".into()))
    }
    fn entries(&self) -> filecolly::CollectResult<Vec<(String, i64)>> {
        Err(CollectError::CacheIo("disk gone".into()))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

#[test]
fn test_classify_fails_open_on_cache_error() {
    let cache = DedupCache::new(Box::new(BrokenStore));
    assert_eq!(classify(&cache, Path::new("/x"), 10, 0, &Logger::default()), Sighting::Unseen);
    assert!(!cache.is_fresh("/x", 10, 0));
}

// --- snapshot / reload ---

#[test]
fn test_snapshot_and_reload_into_empty_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let dump = tmp.path().join("dump.txt");
    let cache = memory_cache();
    cache.record("/b.txt", 20).unwrap();
    cache.record("/a file.txt", 10).unwrap();
    assert_eq!(cache.snapshot(&dump).unwrap(), 2);
    assert_eq!(
        fs::read_to_string(&dump).unwrap(),
        "/a file.txt 10\n/b.txt 20\n"
    );

    let fresh = memory_cache();
    assert_eq!(fresh.reload(&dump).unwrap(), 2);
    assert_eq!(fresh.lookup("/a file.txt").unwrap(), Some(10));
    assert_eq!(fresh.list().unwrap(), vec!["/a file.txt", "/b.txt"]);
}

#[test]
fn test_reload_skips_non_empty_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let dump = tmp.path().join("dump.txt");
    fs::write(&dump, "/old 1\n").unwrap();
    let cache = memory_cache();
    cache.record("/live", 5).unwrap();
    assert_eq!(cache.reload(&dump).unwrap(), 0);
    assert_eq!(cache.lookup("/old").unwrap(), None);
}

#[test]
fn test_reload_missing_dump_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = memory_cache();
    assert_eq!(cache.reload(&tmp.path().join("none.txt")).unwrap(), 0);
}

#[test]
fn test_parse_snapshot_skips_malformed_lines() {
    let text = "/ok 1\nnot-a-row\n/bad ts\n\n/win 2\r\n 3\n/also ok 4";
    assert_eq!(
        parse_snapshot(text),
        vec![
            ("/ok".to_string(), 1),
            ("/win".to_string(), 2),
            ("/also ok".to_string(), 4),
        ]
    );
}

#[test]
fn test_reloaded_extreme_timestamps_do_not_overflow() {
    let tmp = tempfile::tempdir().unwrap();
    let dump = tmp.path().join("dump.txt");
    fs::write(
        &dump,
        format!("/ancient {}\n/future {}\n", i64::MIN, i64::MAX),
    )
    .unwrap();
    let cache = memory_cache();
    assert_eq!(cache.reload(&dump).unwrap(), 2);

    let log = Logger::default();
    assert_eq!(
        classify(&cache, Path::new("/ancient"), 10, 100, &log),
        Sighting::Expired
    );
    assert!(!cache.is_fresh("/ancient", 10, 100));
    assert_eq!(
        classify(&cache, Path::new("/future"), 10, 100, &log),
        Sighting::Fresh
    );
}

#[test]
fn test_snapshot_counts_written_lines_only() {
    let tmp = tempfile::tempdir().unwrap();
    let dump = tmp.path().join("dump.txt");
    let cache = memory_cache();
    cache.record("/ok", 1).unwrap();
    cache.record("/split\nname", 2).unwrap();
    assert_eq!(cache.snapshot(&dump).unwrap(), 1);
    assert_eq!(fs::read_to_string(&dump).unwrap(), "/ok 1\n");
}

#[test]
fn test_snapshot_with_sqlite_store() {
    let tmp = tempfile::tempdir().unwrap();
    let dump = tmp.path().join("dump.txt");
    let cache = DedupCache::new(Box::new(sqlite_store(tmp.path())));
    cache.record("/s", 7).unwrap();
    cache.snapshot(&dump).unwrap();

    let other = DedupCache::new(Box::new(
        SqliteCacheStore::open(&tmp.path().join("other.db"), "fscacher").unwrap(),
    ));
    assert_eq!(other.reload(&dump).unwrap(), 1);
    assert_eq!(other.lookup("/s").unwrap(), Some(7));
}

// --- destination admission ---

#[test]
fn test_push_at_limit_is_queue_full_without_mutation() {
    let queue = MemoryQueue::new();
    for i in 0..5u8 {
        queue.push(&[i]).unwrap();
    }
    let sender = sender_with(&queue, 5);
    assert!(!sender.is_admissible());
    assert!(matches!(
        sender.push(b"more"),
        Err(CollectError::QueueFull { depth: 5, limit: 5 })
    ));
    assert!(matches!(
        sender.push_batch(&[b"x".to_vec(), b"y".to_vec()]),
        Err(CollectError::QueueFull { .. })
    ));
    assert_eq!(queue.len(), 5);
}

#[test]
fn test_push_below_limit_is_admitted() {
    let queue = MemoryQueue::new();
    for i in 0..4u8 {
        queue.push(&[i]).unwrap();
    }
    let sender = sender_with(&queue, 5);
    assert!(sender.is_admissible());
    sender.push(b"fifth").unwrap();
    assert_eq!(queue.len(), 5);
    assert!(!sender.is_admissible());
}

#[test]
fn test_push_unhealthy_is_connection_error() {
    let queue = MemoryQueue::new();
    queue.set_healthy(false);
    let sender = sender_with(&queue, 5);
    assert!(!sender.health_check());
    assert!(matches!(
        sender.push(b"x"),
        Err(CollectError::Connection(_))
    ));
    assert!(!sender.is_admissible());
    queue.set_healthy(true);
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_push_batch_preserves_order() {
    let queue = MemoryQueue::new();
    let sender = sender_with(&queue, 100);
    sender.push_batch(&[]).unwrap();
    sender
        .push_batch(&[b"1".to_vec(), b"2".to_vec(), b"3".to_vec()])
        .unwrap();
    assert_eq!(queue.drain(), vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
}

#[test]
fn test_concurrent_pushes_overshoot_is_bounded() {
    // Admission is check-then-push, so concurrent senders may overshoot by at most one each.
    let queue = MemoryQueue::new();
    let sender = std::sync::Arc::new(sender_with(&queue, 10));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sender = std::sync::Arc::clone(&sender);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    let _ = sender.push(b"r");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let len = queue.len();
    assert!((10..=13).contains(&len), "depth {len}");
}
