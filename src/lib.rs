//! Filecolly: directory-watching file shipping agent.
//!
//! One run walks the collect directory, filters candidates, compresses and packs each file into a
//! msgpack record, skips paths sent within the cache timeout, and pushes the rest onto a
//! size-bounded queue. See [`Collector::send_flow`].

pub mod backend;
pub mod collector;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use backend::{DedupCache, DestSender};
pub use collector::Collector;
pub use error::{CollectError, CollectResult};

use log::debug;

/// Result alias used by public filecolly API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: build the backends described by `backend`, run one collection over
/// `opts.collect_dir` with the standard filters, and return its report.
///
/// ```ignore
/// let opts = filecolly::Opts { collect_dir: "/data/in".into(), ..Default::default() };
/// let backend = filecolly::BackendOpts { dry_run: true, ..Default::default() };
/// let report = filecolly::collect_once(&opts, &backend)?;
/// println!("sent {}", report.dispatched);
/// ```
pub fn collect_once(opts: &Opts, backend: &BackendOpts) -> Result<RunReport> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let (sender, cache) = backend::build_backends(opts, backend)?;
    let collector = Collector::new(opts.clone(), sender, cache, utils::Logger::default())?;
    collector
        .walker()
        .on_filter(engine::filters::generic_file_filter);
    collector.on_filter(engine::filters::allow_all);
    Ok(collector.send_flow())
}
