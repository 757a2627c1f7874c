//! Pipeline context: shared, read-only state handed to every stage of one run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{DedupCache, DestSender};
use crate::engine::cancel::CancelToken;
use crate::engine::filters::FilterSet;
use crate::error::CollectError;
use crate::utils::Logger;
use crate::{Rule, RunReport};

use super::throttle::ThrottleCounter;

/// Wall clock in unix seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Built once per run in [`Collector::send_flow`](crate::Collector::send_flow) and shared by
/// readers, senders and the cleanup stage.
pub struct PipelineContext {
    pub rule: Rule,
    /// Collector filters (walker filters already ran on the walk thread).
    pub filters: FilterSet,
    pub cache: Arc<DedupCache>,
    pub sender: Arc<DestSender>,
    pub throttle: Arc<ThrottleCounter>,
    pub cancel: CancelToken,
    pub log: Logger,
    pub clock: Clock,
    /// Seconds a dispatched path stays fresh.
    pub cache_timeout: i64,
    pub stats: RunStats,
}

impl PipelineContext {
    pub fn now(&self) -> i64 {
        (self.clock)()
    }
}

/// Per-run counters, bumped from any worker.
#[derive(Default)]
pub struct RunStats {
    pub scanned: AtomicU64,
    pub rejected: AtomicU64,
    pub deduped: AtomicU64,
    pub expired: AtomicU64,
    pub dispatched: AtomicU64,
    pub throttled: AtomicU64,
    pub failed: AtomicU64,
}

impl RunStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_report(&self, walk_error: Option<CollectError>) -> RunReport {
        RunReport {
            scanned: self.scanned.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            deduped: self.deduped.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            walk_error,
        }
    }
}
