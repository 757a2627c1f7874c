//! Collector: one run of walk -> filter -> encode -> dedup -> send -> cleanup.

use anyhow::Result;
use crossbeam_channel::{bounded, unbounded};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::backend::{DedupCache, DestSender};
use crate::engine::cancel::CancelToken;
use crate::engine::filters::FilterChain;
use crate::engine::tools::now_secs;
use crate::error::{CollectError, CollectResult};
use crate::pipeline::{
    Clock, FileWalker, PipelineContext, RunStats, ThrottleCounter, WalkHandles,
    spawn_cleanup_stage, spawn_reader_workers, spawn_sender_workers, wait_walk,
};
use crate::utils::{Logger, cap_workers};
use crate::{EncodeResult, Opts, Rule, RunReport, RunState};

pub struct Collector {
    opts: Opts,
    rule: Rule,
    walker: FileWalker,
    /// Applied by the readers, after the walker's own filters.
    filters: FilterChain,
    sender: Arc<DestSender>,
    cache: Arc<DedupCache>,
    throttle: Arc<ThrottleCounter>,
    cancel: CancelToken,
    log: Logger,
    clock: Clock,
    state: Mutex<RunState>,
    dispatched_total: AtomicU64,
    reader_workers: usize,
}

impl Collector {
    /// Build a collector over `opts.collect_dir`. No filters are registered; the caller adds them
    /// through [`walker`](Self::walker) and [`on_filter`](Self::on_filter).
    pub fn new(opts: Opts, sender: DestSender, cache: DedupCache, log: Logger) -> Result<Self> {
        anyhow::ensure!(opts.dest_queue_limit > 0, "dest queue limit must be positive");
        anyhow::ensure!(opts.cache_timeout_secs >= 0, "cache timeout must not be negative");
        let rule = Rule::from(&opts);
        let walker = FileWalker::new(&opts.collect_dir, rule.clone())
            .strategy(opts.walk_strategy)
            .follow_links(opts.follow_links)
            .strict(opts.strict_walk)
            .logger(log.child("walk"));
        let reader_workers = cap_workers(opts.reader_workers);
        debug!(
            target: log.target(),
            "collector on {}: {} readers, {} senders, cache={}, destination={}",
            opts.collect_dir.display(),
            reader_workers,
            opts.sender_workers,
            cache.store_name(),
            sender.backend_name()
        );
        Ok(Self {
            throttle: Arc::new(ThrottleCounter::new(opts.dest_queue_limit, opts.counter_slack)),
            rule,
            walker,
            filters: FilterChain::new(),
            sender: Arc::new(sender),
            cache: Arc::new(cache),
            cancel: CancelToken::new(),
            log,
            clock: Arc::new(now_secs),
            state: Mutex::new(RunState::Idle),
            dispatched_total: AtomicU64::new(0),
            reader_workers,
            opts,
        })
    }

    /// Replace the wall clock used for dedup timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn walker(&self) -> &FileWalker {
        &self.walker
    }

    /// Add a collector filter, evaluated by the readers on every walked item.
    pub fn on_filter<F>(&self, f: F)
    where
        F: Fn(&Path, &Rule) -> bool + Send + Sync + 'static,
    {
        self.filters.on_filter(f);
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Takes effect from the next run.
    pub fn set_rule(&mut self, rule: Rule) {
        self.walker.set_rule(rule.clone());
        self.rule = rule;
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// Every path currently in the dedup cache, sorted.
    pub fn list_cache_files(&self) -> CollectResult<Vec<String>> {
        self.cache.list()
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn sender(&self) -> &DestSender {
        &self.sender
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel the current run (and every later one). In-flight work drains, then `send_flow`
    /// returns.
    pub fn shutdown(&self) {
        if !self.cancel.is_canceled() {
            info!(target: self.log.target(), "shutting down collector");
        }
        self.cancel.cancel();
    }

    /// Records dispatched over the collector's lifetime.
    pub fn dispatched_total(&self) -> u64 {
        self.dispatched_total.load(Ordering::Relaxed)
    }

    fn set_state(&self, next: RunState) {
        let next = if self.cancel.is_canceled() && next != RunState::Idle {
            RunState::Aborting
        } else {
            next
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(target: self.log.target(), "state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn snapshot_path(&self) -> Option<&PathBuf> {
        self.opts.snapshot_path.as_ref()
    }

    fn prepare_run(&self) {
        match self.throttle.resync(|| self.sender.depth()) {
            Ok(depth) => debug!(target: self.log.target(), "destination depth {}", depth),
            Err(e) => warn!(target: self.log.target(), "queue depth unavailable: {}", e),
        }
        if self.opts.reload_snapshot
            && let Some(dump) = self.snapshot_path()
        {
            match self.cache.reload(dump) {
                Ok(0) => {}
                Ok(n) => info!(
                    target: self.log.target(),
                    "reloaded {} cache entries from {}", n, dump.display()
                ),
                Err(e) => warn!(target: self.log.target(), "cache reload failed: {:#}", e),
            }
        }
    }

    fn build_context(&self) -> Arc<PipelineContext> {
        Arc::new(PipelineContext {
            rule: self.rule.clone(),
            filters: self.filters.fixed(),
            cache: Arc::clone(&self.cache),
            sender: Arc::clone(&self.sender),
            throttle: Arc::clone(&self.throttle),
            cancel: self.cancel.clone(),
            log: self.log.clone(),
            clock: Arc::clone(&self.clock),
            cache_timeout: self.opts.cache_timeout_secs,
            stats: RunStats::default(),
        })
    }

    /// One full run. Blocks until every stage has drained. Per-file failures are counted in the
    /// report; a terminal walk error (including cancellation) is logged and returned in
    /// [`RunReport::walk_error`].
    pub fn send_flow(&self) -> RunReport {
        self.set_state(RunState::Scanning);
        self.prepare_run();
        let ctx = self.build_context();

        let WalkHandles {
            items,
            done,
            handle: walk_handle,
            ..
        } = self.walker.walk(&self.cancel);

        self.set_state(RunState::FanningOut);
        let (result_tx, result_rx) = bounded::<EncodeResult>(self.opts.result_buffer);
        let (cleanup_tx, cleanup_rx) = unbounded::<PathBuf>();
        let cleanup = spawn_cleanup_stage(cleanup_rx, &ctx, self.opts.cleanup_workers);
        let readers =
            spawn_reader_workers(items, &result_tx, &cleanup_tx, &ctx, self.reader_workers);
        // Dropping the last senders closes the channels once readers exit.
        drop(result_tx);
        drop(cleanup_tx);
        let senders = spawn_sender_workers(result_rx, &ctx, self.opts.sender_workers);

        join_all(readers, "reader", &self.log);
        self.set_state(RunState::FanningIn);
        join_all(senders, "sender", &self.log);
        if cleanup.join().is_err() {
            warn!(target: self.log.target(), "cleanup stage panicked");
        }

        if let Some(dump) = self.snapshot_path() {
            match self.cache.snapshot(dump) {
                Ok(n) => debug!(
                    target: self.log.target(),
                    "cache snapshot: {} entries to {}", n, dump.display()
                ),
                Err(e) => warn!(target: self.log.target(), "cache snapshot failed: {:#}", e),
            }
        }

        let walk_status = wait_walk(&done, walk_handle, &self.log);
        let walk_error = match walk_status {
            Ok(n) => {
                debug!(target: self.log.target(), "walk finished, {} files", n);
                None
            }
            Err(CollectError::WalkCanceled) => {
                info!(target: self.log.target(), "walk canceled");
                Some(CollectError::WalkCanceled)
            }
            Err(e) => {
                warn!(target: self.log.target(), "walk error: {}", e);
                Some(e)
            }
        };

        let report = ctx.stats.to_report(walk_error);
        self.dispatched_total
            .fetch_add(report.dispatched, Ordering::Relaxed);
        info!(
            target: self.log.target(),
            "run done: scanned {}, sent {}, deduped {}, expired {}, throttled {}, rejected {}, failed {} (total sent {})",
            report.scanned,
            report.dispatched,
            report.deduped,
            report.expired,
            report.throttled,
            report.rejected,
            report.failed,
            self.dispatched_total()
        );
        if self.cancel.is_canceled() {
            self.set_state(RunState::Aborting);
        }
        self.set_state(RunState::Idle);
        report
    }
}

fn join_all(handles: Vec<JoinHandle<()>>, stage: &str, log: &Logger) {
    for h in handles {
        if h.join().is_err() {
            warn!(target: log.target(), "{} worker panicked", stage);
        }
    }
}
