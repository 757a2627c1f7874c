use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

/// Watch a directory and ship its files to a Redis queue.
#[derive(Clone, Parser)]
#[command(name = "filecolly")]
#[command(about = "Collect files from a directory and push them to a Redis list; use --dry-run to keep records in memory.")]
pub struct Cli {
    /// Directory to collect from. Default: `/opt/files` (or `collect_directory` from the config).
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Config file. Default: `filecolly.toml` in the working directory (skipped if missing).
    #[arg(long, short = 'C')]
    pub config: Option<PathBuf>,

    /// Redis host.
    #[arg(long)]
    pub redis_host: Option<String>,

    /// Redis port.
    #[arg(long)]
    pub redis_port: Option<u16>,

    /// Redis database number.
    #[arg(long)]
    pub redis_db: Option<i64>,

    /// Redis password.
    #[arg(long, env = "FILECOLLY_REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Destination list name.
    #[arg(long, short = 'q')]
    pub dest_queue: Option<String>,

    /// Stop pushing once the destination holds this many records.
    #[arg(long, short = 'L')]
    pub dest_queue_limit: Option<i64>,

    /// Concurrent file readers (capped by the open-file limit).
    #[arg(long)]
    pub max_reader: Option<usize>,

    /// Concurrent senders.
    #[arg(long)]
    pub max_sender: Option<usize>,

    /// Largest file collected, e.g. `200M`, `10K`, `1G`, `512B`.
    #[arg(long, short = 's')]
    pub file_limit: Option<String>,

    /// Collect zero-byte files.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub allow_empty: Option<bool>,

    /// Seconds a file must be unmodified before it is collected.
    #[arg(long, short = 'w')]
    pub read_wait_time: Option<i64>,

    /// Keep files after they are sent.
    #[arg(long, short = 'r', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub reserve_file: Option<bool>,

    /// Seconds a sent path stays in the dedup cache.
    #[arg(long, short = 't')]
    pub cache_timeout: Option<i64>,

    /// Dedup cache store: `embedded` (SQLite file) or `redis`.
    #[arg(long)]
    pub cache_backend: Option<String>,

    /// Walk strategy: `recursive` or `wide`.
    #[arg(long)]
    pub walk: Option<String>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Strict walk: stop on the first unreadable directory instead of skipping it.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub strict: Option<bool>,

    /// Seconds between runs.
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Run once and exit.
    #[arg(long)]
    pub once: bool,

    /// Keep records in memory instead of pushing to Redis. Files are still removed unless
    /// `--reserve-file` is set.
    #[arg(long)]
    pub dry_run: bool,

    /// Print cached paths and exit.
    #[arg(long)]
    pub list_cache: bool,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Append log output to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Config path, defaulting to the package config filename in the working directory.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(PackagePaths::get().config_filename()))
    }
}
