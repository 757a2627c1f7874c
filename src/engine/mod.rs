//! Engine: CLI, cancellation, worker pool, filters, encoder and path tools.

pub mod arg_parser;
pub mod cancel;
pub mod cli;
pub mod encoder;
pub mod filters;
pub mod pool;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cancel::{CancelToken, send_or_cancel};
pub use cli::{build_opts, handle_run};
pub use encoder::{DecodedRecord, compress, decode_record, encode};
pub use filters::{FilterChain, FilterFn, FilterSet, allow_all, generic_file_filter};
pub use pool::{PoolClosed, Task, WorkerPool};
pub use tools::{now_secs, path_key, path_relative_to, relative_index};
