//! Public and internal types for the filecolly API and pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CollectError;
use crate::utils::config::{CollectDefaults, PackagePaths};

/// One candidate file produced by the walker. Consumed exactly once by a reader worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileItem {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path with the scan root stripped, keeping the leading separator (e.g. `/sub/a.txt`).
    pub relative_index: PathBuf,
    pub size: u64,
}

/// Filter policy. Read-only during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub max_file_size: u64,
    pub allow_empty_files: bool,
    /// Minimum age since last modification before a file is collected.
    pub collect_wait_secs: i64,
    /// Keep the source file after a successful dispatch.
    pub reserve_source_file: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            max_file_size: CollectDefaults::FILE_MAX_SIZE,
            allow_empty_files: false,
            collect_wait_secs: CollectDefaults::READ_WAIT_SECS,
            reserve_source_file: false,
        }
    }
}

impl From<&Opts> for Rule {
    fn from(o: &Opts) -> Self {
        Rule {
            max_file_size: o.file_max_size,
            allow_empty_files: o.allow_empty,
            collect_wait_secs: o.read_wait_secs,
            reserve_source_file: o.reserve_file,
        }
    }
}

/// Output of a reader worker for one file. Terminal: consumed once by a sender worker.
#[derive(Debug)]
pub struct EncodeResult {
    pub path: PathBuf,
    pub payload: Vec<u8>,
    pub error: Option<CollectError>,
}

impl EncodeResult {
    pub fn ok(path: PathBuf, payload: Vec<u8>) -> Self {
        Self {
            path,
            payload,
            error: None,
        }
    }

    pub fn failed(path: PathBuf, error: CollectError) -> Self {
        Self {
            path,
            payload: Vec::new(),
            error: Some(error),
        }
    }
}

/// Directory traversal strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalkStrategy {
    /// Depth-first recursive walk (walkdir).
    #[default]
    Recursive,
    /// Iterative walk over an explicit stack of pending directories.
    Wide,
}

/// Which store backs the dedup cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Single-file SQLite store on local disk.
    #[default]
    Embedded,
    /// Redis hash keyed by namespace.
    Redis,
}

/// Orchestrator state. Any state may move to `Aborting` on cancel; every run ends in `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    FanningOut,
    FanningIn,
    Aborting,
}

/// Counters for one collector run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Items produced by the walker.
    pub scanned: u64,
    pub rejected: u64,
    /// Seen within the cache timeout; not re-sent.
    pub deduped: u64,
    /// Cache entry past the timeout; entry removed and file cleaned up.
    pub expired: u64,
    pub dispatched: u64,
    /// Skipped because the destination was (or was assumed) full.
    pub throttled: u64,
    /// Read, encode or push failures.
    pub failed: u64,
    /// Terminal walker error, if any (including cancellation).
    pub walk_error: Option<CollectError>,
}

/// Full resolved settings (CLI, config file and library callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Directory to collect from.
    pub collect_dir: PathBuf,
    pub walk_strategy: WalkStrategy,
    /// Stop the walk on the first traversal error below the root instead of skipping it.
    pub strict_walk: bool,
    pub follow_links: bool,
    pub reader_workers: usize,
    pub sender_workers: usize,
    /// Workers deleting files whose cache entries expired.
    pub cleanup_workers: usize,
    /// Capacity of the channel between reader and sender workers.
    pub result_buffer: usize,
    /// Max file size in bytes.
    pub file_max_size: u64,
    pub allow_empty: bool,
    /// Seconds a file must be unmodified before it is read.
    pub read_wait_secs: i64,
    /// Keep file after it is sent.
    pub reserve_file: bool,
    /// Seconds a dispatched path stays in the dedup cache.
    pub cache_timeout_secs: i64,
    pub dest_queue_limit: i64,
    /// Drift past the queue limit tolerated before the throttle counter is resynchronized.
    pub counter_slack: i64,
    /// Flat `path timestamp` dump of the cache. None disables snapshot and reload.
    pub snapshot_path: Option<PathBuf>,
    /// Reload the snapshot into an empty cache at the start of each run.
    pub reload_snapshot: bool,
    pub scan_interval: Duration,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            collect_dir: PathBuf::from(CollectDefaults::COLLECT_DIR),
            walk_strategy: WalkStrategy::default(),
            strict_walk: true,
            follow_links: false,
            reader_workers: CollectDefaults::READER_WORKERS,
            sender_workers: CollectDefaults::SENDER_WORKERS,
            cleanup_workers: CollectDefaults::CLEANUP_WORKERS,
            result_buffer: CollectDefaults::RESULT_BUFFER,
            file_max_size: CollectDefaults::FILE_MAX_SIZE,
            allow_empty: false,
            read_wait_secs: CollectDefaults::READ_WAIT_SECS,
            reserve_file: false,
            cache_timeout_secs: CollectDefaults::CACHE_TIMEOUT_SECS,
            dest_queue_limit: CollectDefaults::DEST_QUEUE_LIMIT,
            counter_slack: CollectDefaults::COUNTER_SLACK,
            snapshot_path: Some(PathBuf::from(PackagePaths::get().snapshot_filename())),
            reload_snapshot: true,
            scan_interval: Duration::from_secs(CollectDefaults::SCAN_INTERVAL_SECS),
            verbose: false,
            log_file: None,
        }
    }
}

/// Connection settings for the destination queue and the dedup cache store.
#[derive(Clone, Debug)]
pub struct BackendOpts {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub redis_password: Option<String>,
    pub dest_queue: String,
    pub cache_backend: CacheBackendKind,
    /// SQLite file for the embedded cache.
    pub cache_db_path: PathBuf,
    /// Bucket (table) or hash name the cache keys live under.
    pub cache_namespace: String,
    /// Ship into an in-memory queue instead of Redis.
    pub dry_run: bool,
}

impl Default for BackendOpts {
    fn default() -> Self {
        Self {
            redis_host: CollectDefaults::REDIS_HOST.to_string(),
            redis_port: CollectDefaults::REDIS_PORT,
            redis_db: 0,
            redis_password: None,
            dest_queue: CollectDefaults::DEST_QUEUE.to_string(),
            cache_backend: CacheBackendKind::default(),
            cache_db_path: PathBuf::from(PackagePaths::get().cache_db_filename()),
            cache_namespace: CollectDefaults::CACHE_NAMESPACE.to_string(),
            dry_run: false,
        }
    }
}

impl BackendOpts {
    /// `redis://[:password@]host:port/db`
    pub fn redis_url(&self) -> String {
        let auth = self
            .redis_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        format!(
            "redis://{}{}:{}/{}",
            auth, self.redis_host, self.redis_port, self.redis_db
        )
    }
}
