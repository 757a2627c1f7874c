//! Pipeline tests: walker, cancellation, and full collector runs against in-memory backends.

use filecolly::backend::{
    CacheStore, DedupCache, DestSender, MemoryCacheStore, MemoryQueue, QueueBackend,
};
use filecolly::engine::{CancelToken, decode_record, generic_file_filter};
use filecolly::error::CollectError;
use filecolly::pipeline::FileWalker;
use filecolly::utils::Logger;
use filecolly::{Collector, Opts, Rule, RunState, WalkStrategy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

fn test_rule() -> Rule {
    Rule {
        max_file_size: 1 << 20,
        allow_empty_files: false,
        collect_wait_secs: 0,
        reserve_source_file: false,
    }
}

fn test_opts(dir: &Path) -> Opts {
    Opts {
        collect_dir: dir.to_path_buf(),
        reader_workers: 4,
        sender_workers: 4,
        cleanup_workers: 2,
        result_buffer: 16,
        read_wait_secs: 0,
        cache_timeout_secs: 10,
        dest_queue_limit: 100,
        snapshot_path: None,
        reload_snapshot: false,
        ..Default::default()
    }
}

/// Collector over `opts` with the standard walker filter, backed by the returned in-memory queue
/// and cache store.
fn collector(opts: Opts) -> (Collector, MemoryQueue, MemoryCacheStore) {
    let queue = MemoryQueue::new();
    let store = MemoryCacheStore::new();
    let limit = opts.dest_queue_limit;
    let c = Collector::new(
        opts,
        DestSender::new(Box::new(queue.clone()), limit),
        DedupCache::new(Box::new(store.clone())),
        Logger::default(),
    )
    .unwrap();
    c.walker().on_filter(generic_file_filter);
    (c, queue, store)
}

fn write_file(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let p = dir.join(name);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&p, body).unwrap();
    p
}

fn key(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

// --- walker ---

fn walked(strategy: WalkStrategy, root: &Path) -> Vec<PathBuf> {
    let walker = FileWalker::new(root, test_rule()).strategy(strategy);
    walker.on_filter(generic_file_filter);
    let handles = walker.walk(&CancelToken::new());
    let mut rel: Vec<PathBuf> = handles.items.iter().map(|i| i.relative_index).collect();
    assert_eq!(handles.finish().unwrap(), rel.len());
    rel.sort();
    rel
}

#[cfg(unix)]
#[test]
fn test_walk_strategies_agree() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"0123456789");
    write_file(tmp.path(), ".hidden", b"12345");
    write_file(tmp.path(), "sub/b.txt", b"b");
    write_file(tmp.path(), "sub/deeper/c.txt", b"c");
    let expected = vec![
        PathBuf::from("/a.txt"),
        PathBuf::from("/sub/b.txt"),
        PathBuf::from("/sub/deeper/c.txt"),
    ];
    assert_eq!(walked(WalkStrategy::Recursive, tmp.path()), expected);
    assert_eq!(walked(WalkStrategy::Wide, tmp.path()), expected);
}

#[test]
fn test_walk_reports_item_size() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"0123456789");
    let walker = FileWalker::new(tmp.path(), test_rule());
    let handles = walker.walk(&CancelToken::new());
    let items: Vec<_> = handles.items.iter().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].size, 10);
    assert_eq!(items[0].path, tmp.path().join("a.txt"));
    handles.finish().unwrap();
}

#[test]
fn test_walk_missing_root_is_terminal() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("gone");
    for strategy in [WalkStrategy::Recursive, WalkStrategy::Wide] {
        let walker = FileWalker::new(&missing, test_rule())
            .strategy(strategy)
            .strict(false);
        let handles = walker.walk(&CancelToken::new());
        assert_eq!(handles.items.iter().count(), 0);
        assert!(matches!(
            handles.finish(),
            Err(CollectError::Walk { .. })
        ));
    }
}

#[test]
fn test_walk_cancel_mid_walk() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..50 {
        write_file(tmp.path(), &format!("f{i:02}.txt"), b"x");
    }
    let cancel = CancelToken::new();
    let walker = FileWalker::new(tmp.path(), test_rule());
    let handles = walker.walk(&cancel);
    handles.items.recv().unwrap();
    cancel.cancel();

    // walker is parked on the rendezvous hand-off; cancel must release it
    let status = handles
        .done
        .recv_timeout(Duration::from_secs(5))
        .expect("walk did not stop after cancel");
    assert!(matches!(status, Err(CollectError::WalkCanceled)));
    handles.handle.join().unwrap();
}

#[test]
fn test_walk_consumer_gone_is_canceled() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write_file(tmp.path(), &format!("f{i}.txt"), b"x");
    }
    let walker = FileWalker::new(tmp.path(), test_rule());
    let handles = walker.walk(&CancelToken::new());
    assert!(matches!(handles.finish(), Err(CollectError::WalkCanceled)));
}

// --- collector runs ---

#[cfg(unix)]
#[test]
fn test_run_ships_visible_file_only() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_file(tmp.path(), "a.txt", b"0123456789");
    let hidden = write_file(tmp.path(), ".hidden", b"12345");
    let (c, queue, _) = collector(test_opts(tmp.path()));

    let report = c.send_flow();
    assert!(report.walk_error.is_none());
    assert_eq!(report.scanned, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(c.state(), RunState::Idle);
    assert_eq!(c.dispatched_total(), 1);

    let records = queue.drain();
    assert_eq!(records.len(), 1);
    let rec = decode_record(&records[0]).unwrap();
    assert_eq!(rec.path_lossy(), "/a.txt");
    assert_eq!(rec.content, b"0123456789");

    // sent and not reserved: removed from disk, remembered in the cache
    assert!(!a.exists());
    assert!(hidden.exists());
    assert_eq!(c.list_cache_files().unwrap(), vec![key(&a)]);
}

#[test]
fn test_dedup_window_with_reserved_file() {
    let tmp = tempfile::tempdir().unwrap();
    let f = write_file(tmp.path(), "f.txt", b"payload");
    let now = Arc::new(AtomicI64::new(0));
    let mut opts = test_opts(tmp.path());
    opts.reserve_file = true;
    let (c, queue, store) = collector(opts);
    let clock = Arc::clone(&now);
    let c = c.with_clock(move || clock.load(Ordering::SeqCst));

    let first = c.send_flow();
    assert_eq!(first.dispatched, 1);
    assert_eq!(queue.len(), 1);
    assert!(f.exists());

    now.store(5, Ordering::SeqCst);
    let second = c.send_flow();
    assert_eq!(second.deduped, 1);
    assert_eq!(second.dispatched, 0);
    assert_eq!(queue.len(), 1);
    assert!(f.exists());

    now.store(15, Ordering::SeqCst);
    let third = c.send_flow();
    assert_eq!(third.expired, 1);
    assert_eq!(third.dispatched, 0);
    assert_eq!(queue.len(), 1);
    assert!(!f.exists());
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn test_expired_entry_without_reserve_keeps_file_and_resends() {
    let tmp = tempfile::tempdir().unwrap();
    let f = write_file(tmp.path(), "f.txt", b"v1");
    let now = Arc::new(AtomicI64::new(0));
    let (c, queue, _) = collector(test_opts(tmp.path()));
    let clock = Arc::clone(&now);
    let c = c.with_clock(move || clock.load(Ordering::SeqCst));

    assert_eq!(c.send_flow().dispatched, 1);
    assert!(!f.exists());

    // same name shows up again after the window
    write_file(tmp.path(), "f.txt", b"v2");
    now.store(20, Ordering::SeqCst);
    let expired = c.send_flow();
    assert_eq!(expired.expired, 1);
    assert!(f.exists());
    assert!(c.list_cache_files().unwrap().is_empty());

    let resent = c.send_flow();
    assert_eq!(resent.dispatched, 1);
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_collector_filter_rejection() {
    let tmp = tempfile::tempdir().unwrap();
    let keep = write_file(tmp.path(), "skip.txt", b"no");
    write_file(tmp.path(), "send.txt", b"yes");
    let (c, queue, _) = collector(test_opts(tmp.path()));
    c.on_filter(|p, _| !p.ends_with("skip.txt"));

    let report = c.send_flow();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(queue.len(), 1);
    assert!(keep.exists());
}

#[test]
fn test_full_queue_leaves_files_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_file(tmp.path(), "a.txt", b"a");
    let b = write_file(tmp.path(), "b.txt", b"b");
    let mut opts = test_opts(tmp.path());
    opts.dest_queue_limit = 2;
    let (c, queue, _) = collector(opts);
    queue.push(b"old-1").unwrap();
    queue.push(b"old-2").unwrap();

    let report = c.send_flow();
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.throttled, 2);
    assert_eq!(queue.len(), 2);
    assert!(a.exists() && b.exists());
    assert!(c.list_cache_files().unwrap().is_empty());

    // consumer drained the queue: next run resyncs and ships
    queue.drain();
    assert_eq!(c.send_flow().dispatched, 2);
}

#[test]
fn test_unhealthy_destination_counts_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_file(tmp.path(), "a.txt", b"a");
    let (c, queue, _) = collector(test_opts(tmp.path()));
    queue.set_healthy(false);

    let report = c.send_flow();
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.failed + report.throttled, 1);
    assert!(a.exists());
}

#[test]
fn test_snapshot_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let dump = tmp.path().join("dump.txt");
    let f = write_file(&data, "f.txt", b"x");
    let mut opts = test_opts(&data);
    opts.reserve_file = true;
    opts.cache_timeout_secs = 3600;
    opts.snapshot_path = Some(dump.clone());
    opts.reload_snapshot = true;

    let (first, queue1, _) = collector(opts.clone());
    assert_eq!(first.send_flow().dispatched, 1);
    drop(first);
    assert!(fs::read_to_string(&dump).unwrap().starts_with(&key(&f)));

    // new process: empty cache, reloaded from the dump, so the file is not re-sent
    let (second, queue2, _) = collector(opts);
    let report = second.send_flow();
    assert_eq!(report.deduped, 1);
    assert_eq!(report.dispatched, 0);
    assert_eq!(queue1.len() + queue2.len(), 1);
}

#[test]
fn test_canceled_collector_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_file(tmp.path(), "a.txt", b"a");
    let (c, queue, _) = collector(test_opts(tmp.path()));
    c.shutdown();

    let report = c.send_flow();
    assert!(matches!(report.walk_error, Some(CollectError::WalkCanceled)));
    assert_eq!(report.dispatched, 0);
    assert_eq!(queue.len(), 0);
    assert!(a.exists());
    assert_eq!(c.state(), RunState::Idle);
}

#[test]
fn test_cancel_during_run_drains() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..200 {
        write_file(tmp.path(), &format!("f{i:03}.txt"), b"some bytes");
    }
    let mut opts = test_opts(tmp.path());
    opts.reserve_file = true;
    let (c, _, _) = collector(opts);
    let cancel = c.cancel_token();

    // readers park in the filter until cancel, so the walk cannot finish on its own
    let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
    let gate = cancel.clone();
    c.on_filter(move |_, _| {
        let _ = entered_tx.try_send(());
        gate.wait_timeout(Duration::from_secs(30));
        true
    });

    let c = Arc::new(c);
    let runner = {
        let c = Arc::clone(&c);
        std::thread::spawn(move || c.send_flow())
    };
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("no reader reached the filter");
    let canceled_at = Instant::now();
    cancel.cancel();
    let report = runner.join().unwrap();

    assert!(canceled_at.elapsed() < Duration::from_secs(10));
    assert!(matches!(report.walk_error, Some(CollectError::WalkCanceled)));
    assert!(report.scanned < 200);
    assert_eq!(c.state(), RunState::Idle);
}

#[test]
fn test_set_rule_applies_to_next_run() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "big.bin", &[7u8; 150]);
    let (mut c, queue, _) = collector(test_opts(tmp.path()));
    c.set_rule(Rule {
        max_file_size: 100,
        ..test_rule()
    });
    assert_eq!(c.send_flow().scanned, 0);

    c.set_rule(test_rule());
    assert_eq!(c.send_flow().dispatched, 1);
    assert_eq!(queue.len(), 1);
}
