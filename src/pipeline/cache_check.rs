//! Dedup policy: classify each sighting against the cache, and the cleanup stage that retires
//! expired entries off the readers' path.

use crossbeam_channel::Receiver;
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::backend::DedupCache;
use crate::engine::pool::WorkerPool;
use crate::engine::tools::path_key;
use crate::utils::Logger;

use super::context::PipelineContext;

/// How a path relates to the dedup cache at the moment it is seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sighting {
    /// Not cached (or the cache could not answer). Dispatch.
    Unseen,
    /// Dispatched less than `ttl` seconds ago. Skip.
    Fresh,
    /// Dispatched `ttl` or more seconds ago. Retire the entry, skip this run.
    Expired,
}

/// Classify `path` at time `now`. A cache failure is logged and fails open to [`Sighting::Unseen`].
pub fn classify(cache: &DedupCache, path: &Path, ttl: i64, now: i64, log: &Logger) -> Sighting {
    match cache.lookup(&path_key(path)) {
        Ok(None) => Sighting::Unseen,
        Ok(Some(ts)) if now.saturating_sub(ts) < ttl => Sighting::Fresh,
        Ok(Some(_)) => Sighting::Expired,
        Err(e) => {
            warn!(
                target: log.target(),
                "cache lookup failed for {}, sending anyway: {}", path.display(), e
            );
            Sighting::Unseen
        }
    }
}

/// Retire one expired path: delete the file if it was kept after dispatch, then drop the entry.
pub fn retire_expired(ctx: &PipelineContext, path: &Path) {
    if ctx.rule.reserve_source_file {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(target: ctx.log.target(), "removed expired {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                // keep the entry so the next run retries the delete
                warn!(target: ctx.log.target(), "remove {} failed: {}", path.display(), e);
                return;
            }
        }
    }
    if let Err(e) = ctx.cache.remove(&path_key(path)) {
        warn!(target: ctx.log.target(), "cache remove {} failed: {}", path.display(), e);
    }
}

/// Drain `cleanup_rx` into a pool of `workers`. Returns when the channel closes and every submitted
/// cleanup has finished.
pub fn spawn_cleanup_stage(
    cleanup_rx: Receiver<PathBuf>,
    ctx: &Arc<PipelineContext>,
    workers: usize,
) -> JoinHandle<()> {
    let ctx = Arc::clone(ctx);
    thread::spawn(move || {
        let pool = WorkerPool::new(workers).logger(ctx.log.child("cleanup"));
        while let Ok(path) = cleanup_rx.recv() {
            let ctx = Arc::clone(&ctx);
            if pool.submit(move || retire_expired(&ctx, &path)).is_err() {
                break;
            }
        }
        pool.shutdown();
    })
}
