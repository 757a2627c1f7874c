//! Sender workers: throttle, push, then record the dispatch and clean up the source.

use crossbeam_channel::{Receiver, select};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::EncodeResult;
use crate::engine::tools::path_key;
use crate::error::CollectError;

use super::context::{PipelineContext, RunStats};
use super::throttle::Admission;

/// Push one encoded record and do the bookkeeping for a successful dispatch.
pub fn dispatch(ctx: &PipelineContext, path: &Path, payload: &[u8]) {
    match ctx.sender.push(payload) {
        Ok(()) => {
            RunStats::bump(&ctx.stats.dispatched);
            info!(target: ctx.log.target(), "sent {} ({} bytes)", path.display(), payload.len());
            if let Err(e) = ctx.cache.record(&path_key(path), ctx.now()) {
                warn!(target: ctx.log.target(), "cache record {} failed: {}", path.display(), e);
            }
            if !ctx.rule.reserve_source_file
                && let Err(e) = std::fs::remove_file(path)
            {
                warn!(target: ctx.log.target(), "remove {} failed: {}", path.display(), e);
            }
        }
        Err(CollectError::QueueFull { depth, limit }) => {
            RunStats::bump(&ctx.stats.throttled);
            debug!(
                target: ctx.log.target(),
                "queue full ({}/{}), {} left for next run", depth, limit, path.display()
            );
        }
        Err(e) if e.is_transient() => {
            RunStats::bump(&ctx.stats.failed);
            warn!(
                target: ctx.log.target(),
                "send {} failed, retry next run: {}", path.display(), e
            );
        }
        Err(e) => {
            RunStats::bump(&ctx.stats.failed);
            warn!(target: ctx.log.target(), "send {} failed: {}", path.display(), e);
        }
    }
}

fn handle_result(ctx: &PipelineContext, result: EncodeResult) {
    if let Some(err) = result.error {
        if err.is_rejection() {
            RunStats::bump(&ctx.stats.rejected);
            debug!(target: ctx.log.target(), "{}", err);
        } else {
            RunStats::bump(&ctx.stats.failed);
        }
        return;
    }
    match ctx.throttle.admit(|| ctx.sender.depth()) {
        Admission::Admit => dispatch(ctx, &result.path, &result.payload),
        Admission::AssumedFull => {
            RunStats::bump(&ctx.stats.throttled);
            debug!(
                target: ctx.log.target(),
                "queue assumed full, {} left for next run", result.path.display()
            );
        }
        Admission::Full => {
            RunStats::bump(&ctx.stats.throttled);
            info!(
                target: ctx.log.target(),
                "queue at limit {}, {} left for next run", ctx.throttle.limit(), result.path.display()
            );
        }
    }
}

fn sender_worker_loop(result_rx: Receiver<EncodeResult>, ctx: Arc<PipelineContext>) {
    loop {
        let result = select! {
            recv(result_rx) -> msg => match msg {
                Ok(result) => result,
                Err(_) => break,
            },
            recv(ctx.cancel.done()) -> _ => break,
        };
        handle_result(&ctx, result);
    }
}

/// Spawn `m` senders draining `result_rx` until it closes or the run is canceled.
pub fn spawn_sender_workers(
    result_rx: Receiver<EncodeResult>,
    ctx: &Arc<PipelineContext>,
    m: usize,
) -> Vec<JoinHandle<()>> {
    (0..m.max(1))
        .map(|_| {
            let result_rx = result_rx.clone();
            let ctx = Arc::clone(ctx);
            thread::spawn(move || sender_worker_loop(result_rx, ctx))
        })
        .collect()
}
