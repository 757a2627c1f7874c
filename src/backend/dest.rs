//! Destination sender: admission-checked pushes onto the destination queue.

use crate::backend::QueueBackend;
use crate::error::{CollectError, CollectResult};

/// Pushes records onto a [`QueueBackend`], refusing when it is unhealthy or at its limit.
///
/// The health and depth checks are separate round trips before the push, so concurrent senders
/// can each pass admission and together overshoot `limit` by a few records. The limit is a soft
/// bound.
pub struct DestSender {
    backend: Box<dyn QueueBackend>,
    limit: i64,
}

impl DestSender {
    pub fn new(backend: Box<dyn QueueBackend>, limit: i64) -> Self {
        Self { backend, limit }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn depth(&self) -> CollectResult<i64> {
        self.backend.depth()
    }

    pub fn health_check(&self) -> bool {
        self.backend.ping()
    }

    /// `depth() < limit`. False when the depth cannot be read.
    pub fn is_admissible(&self) -> bool {
        self.depth().map(|d| d < self.limit).unwrap_or(false)
    }

    /// Health check, then admission check, then push. Nothing is pushed when either check fails.
    fn admit(&self) -> CollectResult<()> {
        if !self.health_check() {
            return Err(CollectError::Connection(format!(
                "{} destination not answering",
                self.backend.name()
            )));
        }
        let depth = self.depth()?;
        if depth >= self.limit {
            return Err(CollectError::QueueFull {
                depth,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn push(&self, record: &[u8]) -> CollectResult<()> {
        self.admit()?;
        self.backend.push(record)
    }

    /// One round trip for many records. Same admission policy as [`push`](Self::push); the batch
    /// goes whole or not at all.
    pub fn push_batch(&self, records: &[Vec<u8>]) -> CollectResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.admit()?;
        self.backend.push_batch(records)
    }
}
