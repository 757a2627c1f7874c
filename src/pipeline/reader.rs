//! Reader workers: collector filters, dedup classification, read and encode.

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::cancel::send_or_cancel;
use crate::engine::encoder::encode;
use crate::error::CollectError;
use crate::{EncodeResult, FileItem};

use super::cache_check::{Sighting, classify};
use super::context::{PipelineContext, RunStats};

/// Turn one item into its result, or None when nothing should reach the senders (deduped or
/// handed to cleanup).
fn process_item(
    item: FileItem,
    ctx: &PipelineContext,
    cleanup_tx: &Sender<PathBuf>,
) -> Option<EncodeResult> {
    if !ctx.filters.matches(&item.path, &ctx.rule) {
        let err = CollectError::FilterRejected {
            path: item.path.clone(),
        };
        return Some(EncodeResult::failed(item.path, err));
    }

    match classify(&ctx.cache, &item.path, ctx.cache_timeout, ctx.now(), &ctx.log) {
        Sighting::Fresh => {
            RunStats::bump(&ctx.stats.deduped);
            debug!(target: ctx.log.target(), "{} already sent, skip", item.path.display());
            return None;
        }
        Sighting::Expired => {
            RunStats::bump(&ctx.stats.expired);
            debug!(target: ctx.log.target(), "{} cache entry expired", item.path.display());
            // unbounded: cleanup never stalls reading
            let _ = cleanup_tx.send(item.path);
            return None;
        }
        Sighting::Unseen => {}
    }

    let raw = match std::fs::read(&item.path) {
        Ok(raw) => raw,
        Err(source) => {
            warn!(target: ctx.log.target(), "read {} failed: {}", item.path.display(), source);
            let err = CollectError::Read {
                path: item.path.clone(),
                source,
            };
            return Some(EncodeResult::failed(item.path, err));
        }
    };
    match encode(&item.relative_index, &raw) {
        Ok(payload) => Some(EncodeResult::ok(item.path, payload)),
        Err(e) => {
            warn!(target: ctx.log.target(), "encode {} failed: {}", item.path.display(), e);
            Some(EncodeResult::failed(item.path, e))
        }
    }
}

fn reader_worker_loop(
    items_rx: Receiver<FileItem>,
    result_tx: Sender<EncodeResult>,
    cleanup_tx: Sender<PathBuf>,
    ctx: Arc<PipelineContext>,
) {
    loop {
        let item = select! {
            recv(items_rx) -> msg => match msg {
                Ok(item) => item,
                Err(_) => break,
            },
            recv(ctx.cancel.done()) -> _ => break,
        };
        RunStats::bump(&ctx.stats.scanned);
        if let Some(result) = process_item(item, &ctx, &cleanup_tx)
            && !send_or_cancel(&result_tx, result, &ctx.cancel)
        {
            break;
        }
    }
}

/// Spawn `n` readers over `items_rx`. Caller must drop its own `result_tx` and `cleanup_tx` so
/// the downstream stages see their channels close once the readers exit.
pub fn spawn_reader_workers(
    items_rx: Receiver<FileItem>,
    result_tx: &Sender<EncodeResult>,
    cleanup_tx: &Sender<PathBuf>,
    ctx: &Arc<PipelineContext>,
    n: usize,
) -> Vec<JoinHandle<()>> {
    (0..n.max(1))
        .map(|_| {
            let items_rx = items_rx.clone();
            let result_tx = result_tx.clone();
            let cleanup_tx = cleanup_tx.clone();
            let ctx = Arc::clone(ctx);
            thread::spawn(move || reader_worker_loop(items_rx, result_tx, cleanup_tx, ctx))
        })
        .collect()
}
