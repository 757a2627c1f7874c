//! Load `filecolly.toml` (CLI only). Lib callers build [`Opts`] and [`BackendOpts`] directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::size::parse_human_size;
use crate::{BackendOpts, CacheBackendKind, Opts, WalkStrategy};

#[derive(Debug, Default, Deserialize)]
pub struct CollyToml {
    #[serde(default)]
    collector: CollectorSection,
    #[serde(default)]
    redis: RedisSection,
    #[serde(default)]
    cache: CacheSection,
}

#[derive(Debug, Default, Deserialize)]
struct CollectorSection {
    collect_directory: Option<String>,
    walk: Option<String>,
    strict_walk: Option<bool>,
    follow_links: Option<bool>,
    max_reader: Option<usize>,
    max_sender: Option<usize>,
    file_limit: Option<String>,
    allow_empty: Option<bool>,
    read_wait_time: Option<i64>,
    reserve_file: Option<bool>,
    scan_interval: Option<u64>,
    log_file: Option<String>,
    verbose: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RedisSection {
    host: Option<String>,
    port: Option<u16>,
    db: Option<i64>,
    password: Option<String>,
    dest_queue: Option<String>,
    dest_queue_limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    backend: Option<String>,
    db_file: Option<String>,
    namespace: Option<String>,
    timeout: Option<i64>,
    dump_file: Option<String>,
    reload: Option<bool>,
}

/// Load the config file at `path`. Returns None if the file is missing.
pub fn load_colly_toml(path: &Path) -> Result<Option<CollyToml>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed = toml::from_str(&s).with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(parsed))
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

pub fn parse_walk_strategy(s: &str) -> Result<WalkStrategy> {
    match s.to_ascii_lowercase().as_str() {
        "recursive" | "depth" => Ok(WalkStrategy::Recursive),
        "wide" | "stack" => Ok(WalkStrategy::Wide),
        other => anyhow::bail!("unknown walk strategy {:?} (use recursive or wide)", other),
    }
}

pub fn parse_cache_backend(s: &str) -> Result<CacheBackendKind> {
    match s.to_ascii_lowercase().as_str() {
        "embedded" | "sqlite" | "local" => Ok(CacheBackendKind::Embedded),
        "redis" => Ok(CacheBackendKind::Redis),
        other => anyhow::bail!("unknown cache backend {:?} (use embedded or redis)", other),
    }
}

/// Apply file config (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &CollyToml, opts: &mut Opts, backend: &mut BackendOpts) -> Result<()> {
    let c = &file.collector;
    if let Some(ref d) = c.collect_directory {
        opts.collect_dir = PathBuf::from(d);
    }
    if let Some(ref w) = c.walk {
        opts.walk_strategy = parse_walk_strategy(w)?;
    }
    apply_file_opt!(c, opts, strict_walk => strict_walk);
    apply_file_opt!(c, opts, follow_links => follow_links);
    apply_file_opt!(c, opts, max_reader => reader_workers);
    apply_file_opt!(c, opts, max_sender => sender_workers);
    if let Some(ref limit) = c.file_limit {
        opts.file_max_size = parse_human_size(limit)?;
    }
    apply_file_opt!(c, opts, allow_empty => allow_empty);
    apply_file_opt!(c, opts, read_wait_time => read_wait_secs);
    apply_file_opt!(c, opts, reserve_file => reserve_file);
    if let Some(secs) = c.scan_interval {
        opts.scan_interval = Duration::from_secs(secs);
    }
    if let Some(ref p) = c.log_file {
        opts.log_file = Some(PathBuf::from(p));
    }
    apply_file_opt!(c, opts, verbose => verbose);

    let r = &file.redis;
    apply_file_opt!(r, backend, host => redis_host);
    apply_file_opt!(r, backend, port => redis_port);
    apply_file_opt!(r, backend, db => redis_db);
    if let Some(ref pw) = r.password {
        backend.redis_password = Some(pw.clone());
    }
    apply_file_opt!(r, backend, dest_queue => dest_queue);
    apply_file_opt!(r, opts, dest_queue_limit => dest_queue_limit);

    let k = &file.cache;
    if let Some(ref b) = k.backend {
        backend.cache_backend = parse_cache_backend(b)?;
    }
    if let Some(ref p) = k.db_file {
        backend.cache_db_path = PathBuf::from(p);
    }
    apply_file_opt!(k, backend, namespace => cache_namespace);
    apply_file_opt!(k, opts, timeout => cache_timeout_secs);
    if let Some(ref p) = k.dump_file {
        opts.snapshot_path = (!p.is_empty()).then(|| PathBuf::from(p));
    }
    apply_file_opt!(k, opts, reload => reload_snapshot);
    Ok(())
}
