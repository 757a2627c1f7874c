//! Dedup cache: `path -> last dispatch time`, plus the flat-file snapshot that carries it across
//! restarts.
//!
//! The dedup *policy* (what to do with a fresh or stale sighting) lives in the pipeline; this type
//! only answers lookups and keeps the entries.

use anyhow::{Context, Result};
use log::debug;
use std::fmt::Write as _;
use std::path::Path;

use crate::backend::CacheStore;
use crate::error::CollectResult;
use crate::utils::tempfiles::write_atomically;

pub struct DedupCache {
    store: Box<dyn CacheStore>,
}

impl DedupCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn lookup(&self, path: &str) -> CollectResult<Option<i64>> {
        self.store.lookup(path)
    }

    pub fn record(&self, path: &str, timestamp: i64) -> CollectResult<()> {
        self.store.record(path, timestamp)
    }

    pub fn remove(&self, path: &str) -> CollectResult<()> {
        self.store.remove(path)
    }

    /// `found && now - timestamp < ttl`. A lookup failure counts as not fresh.
    pub fn is_fresh(&self, path: &str, ttl: i64, now: i64) -> bool {
        matches!(self.lookup(path), Ok(Some(ts)) if now.saturating_sub(ts) < ttl)
    }

    pub fn entries(&self) -> CollectResult<Vec<(String, i64)>> {
        self.store.entries()
    }

    /// Cached paths, sorted.
    pub fn list(&self) -> CollectResult<Vec<String>> {
        let mut paths: Vec<String> = self.entries()?.into_iter().map(|(k, _)| k).collect();
        paths.sort();
        Ok(paths)
    }

    /// Rewrite `dump` with every entry, one `path timestamp` line each. Returns the number of lines
    /// written; paths containing a newline cannot be represented and are left out.
    pub fn snapshot(&self, dump: &Path) -> Result<usize> {
        let mut entries = self.entries().context("list cache entries")?;
        entries.sort();
        let mut out = String::with_capacity(entries.len() * 64);
        let mut written = 0;
        for (path, ts) in &entries {
            if path.contains('\n') {
                continue;
            }
            let _ = writeln!(out, "{path} {ts}");
            written += 1;
        }
        write_atomically(dump, out.as_bytes())
            .with_context(|| format!("write cache snapshot {}", dump.display()))?;
        Ok(written)
    }

    /// Repopulate an empty cache from `dump`. Malformed lines are skipped. Returns the number of
    /// entries loaded (0 when the dump is missing or the cache already has entries).
    pub fn reload(&self, dump: &Path) -> Result<usize> {
        if !dump.exists() {
            return Ok(0);
        }
        if !self.entries().context("list cache entries")?.is_empty() {
            debug!("cache not empty, skipping reload of {}", dump.display());
            return Ok(0);
        }
        let text = std::fs::read_to_string(dump)
            .with_context(|| format!("read cache snapshot {}", dump.display()))?;
        let entries = parse_snapshot(&text);
        self.store
            .record_many(&entries)
            .context("load cache snapshot")?;
        Ok(entries.len())
    }
}

/// Parse `path timestamp` lines. The timestamp is the last space-separated field, so paths may
/// contain spaces.
pub fn parse_snapshot(text: &str) -> Vec<(String, i64)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (path, ts) = line.rsplit_once(' ')?;
            let ts = ts.trim().parse::<i64>().ok()?;
            (!path.is_empty()).then(|| (path.to_string(), ts))
        })
        .collect()
}
