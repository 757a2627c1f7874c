//! Application configuration constants.
//! Defaults and tuning in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    cache_db_filename: String,
    snapshot_filename: String,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                cache_db_filename: format!(".{pkg}_cache.db"),
                snapshot_filename: format!("{pkg}_dump.txt"),
                config_filename: format!("{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn cache_db_filename(&self) -> &str {
        &self.cache_db_filename
    }

    pub fn snapshot_filename(&self) -> &str {
        &self.snapshot_filename
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Collector defaults ----

/// Defaults for [`Opts`](crate::Opts) and [`BackendOpts`](crate::BackendOpts).
pub struct CollectDefaults;

impl CollectDefaults {
    pub const COLLECT_DIR: &'static str = "/opt/files";
    pub const READER_WORKERS: usize = 500;
    pub const SENDER_WORKERS: usize = 500;
    pub const CLEANUP_WORKERS: usize = 2;
    pub const RESULT_BUFFER: usize = 1024;
    /// 200 MB.
    pub const FILE_MAX_SIZE: u64 = 200 * 1024 * 1024;
    pub const READ_WAIT_SECS: i64 = 2;
    pub const CACHE_TIMEOUT_SECS: i64 = 3600;
    pub const DEST_QUEUE_LIMIT: i64 = 3000;
    /// Drift tolerated past the queue limit before the throttle counter is resynchronized.
    pub const COUNTER_SLACK: i64 = 10;
    pub const SCAN_INTERVAL_SECS: u64 = 3;

    pub const REDIS_HOST: &'static str = "127.0.0.1";
    pub const REDIS_PORT: u16 = 6379;
    pub const DEST_QUEUE: &'static str = "paas:fileserver:files";
    pub const CACHE_NAMESPACE: &'static str = "fscacher";
}

// ---- Encoding ----

/// zlib level used for file content.
pub const COMPRESSION_LEVEL: u32 = 6;

// ---- Cache store ----

pub struct CacheStoreConsts;

impl CacheStoreConsts {
    /// How long an embedded-store operation waits on a locked database (ms).
    pub const BUSY_TIMEOUT_MS: u64 = 5_000;
    /// Socket read/write timeout for Redis connections (seconds).
    pub const REDIS_IO_TIMEOUT_SECS: u64 = 10;
}
