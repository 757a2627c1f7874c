//! Pipeline components: walk, readers, dedup check and cleanup, senders, throttle.

pub mod cache_check;
pub mod context;
pub mod reader;
pub mod sender;
pub mod throttle;
pub mod walk;

pub use cache_check::{Sighting, classify, retire_expired, spawn_cleanup_stage};
pub use context::{Clock, PipelineContext, RunStats};
pub use reader::spawn_reader_workers;
pub use sender::{dispatch, spawn_sender_workers};
pub use throttle::{Admission, ThrottleCounter};
pub use walk::{
    FileWalker, WalkContext, WalkHandles, WalkOutcome, WideWalk, run_walk_loop, to_outcome_walkdir,
    wait_walk,
};
