//! Backends: the destination queue the collector ships into and the store behind the dedup cache.
//!
//! Both are capability traits selected once at construction ([`build_backends`]); the pipeline
//! only ever talks to [`DestSender`] and [`DedupCache`].

pub mod cache;
pub mod dest;
pub mod memory;
pub mod redis_queue;
pub mod redis_store;
pub mod sqlite_store;

use anyhow::{Context, Result};
use log::{info, warn};
use std::time::Duration;

use crate::error::CollectResult;
use crate::utils::config::CacheStoreConsts;
use crate::{BackendOpts, CacheBackendKind, Opts};

pub use cache::DedupCache;
pub use dest::DestSender;
pub use memory::{MemoryCacheStore, MemoryQueue};
pub use redis_queue::RedisQueue;
pub use redis_store::RedisCacheStore;
pub use sqlite_store::SqliteCacheStore;

/// Key/value store holding `path -> last dispatch timestamp` (unix seconds).
pub trait CacheStore: Send + Sync {
    fn lookup(&self, key: &str) -> CollectResult<Option<i64>>;

    /// Upsert.
    fn record(&self, key: &str, timestamp: i64) -> CollectResult<()>;

    /// No error if absent.
    fn remove(&self, key: &str) -> CollectResult<()>;

    /// Every live entry.
    fn entries(&self) -> CollectResult<Vec<(String, i64)>>;

    fn record_many(&self, entries: &[(String, i64)]) -> CollectResult<()> {
        for (key, ts) in entries {
            self.record(key, *ts)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// FIFO the collector pushes packed records onto.
pub trait QueueBackend: Send + Sync {
    fn push(&self, record: &[u8]) -> CollectResult<()>;

    fn push_batch(&self, records: &[Vec<u8>]) -> CollectResult<()>;

    /// Current number of queued records.
    fn depth(&self) -> CollectResult<i64>;

    /// True if the backend answers.
    fn ping(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Open a Redis connection with socket timeouts and check it answers PING.
pub fn connect_redis(url: &str) -> Result<redis::Connection> {
    let timeout = Duration::from_secs(CacheStoreConsts::REDIS_IO_TIMEOUT_SECS);
    let client = redis::Client::open(url).context("parse redis url")?;
    let mut conn = client
        .get_connection_with_timeout(timeout)
        .context("redis connection test fail")?;
    conn.set_read_timeout(Some(timeout))
        .context("set redis read timeout")?;
    conn.set_write_timeout(Some(timeout))
        .context("set redis write timeout")?;
    let pong: String = redis::cmd("PING")
        .query(&mut conn)
        .context("redis connection test fail")?;
    anyhow::ensure!(pong == "PONG", "redis connection test fail: got {:?}", pong);
    Ok(conn)
}

/// Build the destination sender and dedup cache described by `backend`.
pub fn build_backends(opts: &Opts, backend: &BackendOpts) -> Result<(DestSender, DedupCache)> {
    let queue: Box<dyn QueueBackend> = if backend.dry_run {
        warn!("DRY RUN: records are kept in memory and never reach Redis");
        Box::new(MemoryQueue::new())
    } else {
        Box::new(
            RedisQueue::connect(&backend.redis_url(), &backend.dest_queue)
                .with_context(|| format!("connect destination queue {}", backend.dest_queue))?,
        )
    };
    let sender = DestSender::new(queue, opts.dest_queue_limit);

    let cache = build_cache(backend)?;
    info!(
        "Backends: destination={} (limit {}), cache={}",
        sender.backend_name(),
        opts.dest_queue_limit,
        cache.store_name()
    );
    Ok((sender, cache))
}

/// Open the dedup cache store selected by `backend.cache_backend`.
pub fn build_cache(backend: &BackendOpts) -> Result<DedupCache> {
    let store: Box<dyn CacheStore> = match backend.cache_backend {
        CacheBackendKind::Embedded => Box::new(
            SqliteCacheStore::open(&backend.cache_db_path, &backend.cache_namespace)
                .context("open backend cache db failed")?,
        ),
        CacheBackendKind::Redis => Box::new(
            RedisCacheStore::connect(&backend.redis_url(), &backend.cache_namespace)
                .context("connect redis cache")?,
        ),
    };
    Ok(DedupCache::new(store))
}
