//! Approximate dispatch counter used to throttle without asking the queue its depth per item.

use std::sync::{Mutex, PoisonError};

use crate::error::CollectResult;

/// Verdict of [`ThrottleCounter::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Under the limit; the counter was bumped for this push.
    Admit,
    /// Counter past the limit but within slack: assumed still full, real depth not queried.
    AssumedFull,
    /// Resynchronized from the real depth and still at or over the limit.
    Full,
}

/// Counter of records believed to sit on the destination queue.
///
/// Not a ledger: bumped on every admitted push and every assumed-full skip, and overwritten with
/// the real depth at run start and whenever it drifts more than `slack` past `limit`.
pub struct ThrottleCounter {
    count: Mutex<i64>,
    limit: i64,
    slack: i64,
}

impl ThrottleCounter {
    pub fn new(limit: i64, slack: i64) -> Self {
        Self {
            count: Mutex::new(0),
            limit,
            slack: slack.max(0),
        }
    }

    pub fn count(&self) -> i64 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Overwrite the counter with the real depth. On error the counter is left as is.
    pub fn resync<F>(&self, depth: F) -> CollectResult<i64>
    where
        F: FnOnce() -> CollectResult<i64>,
    {
        let d = depth()?;
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) = d;
        Ok(d)
    }

    /// Decide whether one more record may be pushed. `depth` is only called to resynchronize.
    pub fn admit<F>(&self, depth: F) -> Admission
    where
        F: FnOnce() -> CollectResult<i64>,
    {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count >= self.limit {
            if *count - self.limit <= self.slack {
                *count += 1;
                return Admission::AssumedFull;
            }
            match depth() {
                Ok(d) => *count = d,
                Err(_) => return Admission::Full,
            }
            if *count >= self.limit {
                return Admission::Full;
            }
        }
        *count += 1;
        Admission::Admit
    }
}
