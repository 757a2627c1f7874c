//! In-process backends for dry runs and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{CacheStore, QueueBackend};
use crate::error::{CollectError, CollectResult};

#[derive(Default)]
struct QueueInner {
    items: Mutex<VecDeque<Vec<u8>>>,
    down: AtomicBool,
}

/// Shared in-memory FIFO. Clones observe the same queue. Pushes go to the front (LPUSH),
/// [`pop`](MemoryQueue::pop) takes from the back (RPOP).
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<QueueInner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Oldest record.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.items().pop_back()
    }

    /// All records, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.items().drain(..).rev().collect()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.down.store(!healthy, Ordering::SeqCst);
    }

    fn check_up(&self) -> CollectResult<()> {
        if self.inner.down.load(Ordering::SeqCst) {
            return Err(CollectError::Connection("memory queue is down".to_string()));
        }
        Ok(())
    }
}

impl QueueBackend for MemoryQueue {
    fn push(&self, record: &[u8]) -> CollectResult<()> {
        self.check_up()?;
        self.items().push_front(record.to_vec());
        Ok(())
    }

    fn push_batch(&self, records: &[Vec<u8>]) -> CollectResult<()> {
        self.check_up()?;
        let mut items = self.items();
        for r in records {
            items.push_front(r.clone());
        }
        Ok(())
    }

    fn depth(&self) -> CollectResult<i64> {
        self.check_up()?;
        Ok(self.len() as i64)
    }

    fn ping(&self) -> bool {
        !self.inner.down.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// HashMap-backed cache store.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, i64>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(&self, key: &str) -> CollectResult<Option<i64>> {
        Ok(self.map().get(key).copied())
    }

    fn record(&self, key: &str, timestamp: i64) -> CollectResult<()> {
        self.map().insert(key.to_string(), timestamp);
        Ok(())
    }

    fn remove(&self, key: &str) -> CollectResult<()> {
        self.map().remove(key);
        Ok(())
    }

    fn entries(&self) -> CollectResult<Vec<(String, i64)>> {
        Ok(self.map().iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
