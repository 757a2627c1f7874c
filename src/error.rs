//! Error kinds for the collect pipeline.
//!
//! Per-file errors travel on [`EncodeResult`](crate::EncodeResult) and never escape the run;
//! backend errors fail one operation. Nothing here is fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    /// File intentionally skipped by a filter. Not a fault.
    #[error("file not match: {}", path.display())]
    FilterRejected { path: PathBuf },

    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encode: {0}")]
    Encode(String),

    /// Destination or cache backend unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("destination queue size limit ({depth} >= {limit})")]
    QueueFull { depth: i64, limit: i64 },

    #[error("cache io: {0}")]
    CacheIo(String),

    #[error("walk canceled")]
    WalkCanceled,

    #[error("walk {}: {msg}", path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<no-path>".to_string()))]
    Walk { msg: String, path: Option<PathBuf> },
}

impl CollectError {
    /// Backend faults that the next scheduled run may clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CollectError::Connection(_) | CollectError::QueueFull { .. } | CollectError::CacheIo(_)
        )
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, CollectError::FilterRejected { .. })
    }
}

impl From<redis::RedisError> for CollectError {
    fn from(e: redis::RedisError) -> Self {
        CollectError::Connection(e.to_string())
    }
}

impl From<rusqlite::Error> for CollectError {
    fn from(e: rusqlite::Error) -> Self {
        CollectError::CacheIo(e.to_string())
    }
}

pub type CollectResult<T> = std::result::Result<T, CollectError>;
