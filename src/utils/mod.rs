pub mod colly_toml;
pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod size;
pub mod tempfiles;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, cap_workers, max_open_fds, max_workers_by_fd_limit};
pub use logger::{Logger, setup_logging};
pub use size::parse_human_size;
pub use tempfiles::{temp_path_for, write_atomically};
