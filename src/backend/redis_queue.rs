//! Destination queue on a Redis list: LPUSH to enqueue, LLEN for depth, PING for health.

use anyhow::Result;
use log::debug;
use redis::Commands;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{QueueBackend, connect_redis};
use crate::error::CollectResult;

pub struct RedisQueue {
    conn: Mutex<redis::Connection>,
    queue: String,
}

impl RedisQueue {
    pub fn connect(url: &str, queue: &str) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(connect_redis(url)?),
            queue: queue.to_string(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, redis::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueBackend for RedisQueue {
    fn push(&self, record: &[u8]) -> CollectResult<()> {
        self.conn().lpush::<_, _, ()>(&self.queue, record)?;
        Ok(())
    }

    fn push_batch(&self, records: &[Vec<u8>]) -> CollectResult<()> {
        self.conn().lpush::<_, _, ()>(&self.queue, records)?;
        Ok(())
    }

    fn depth(&self) -> CollectResult<i64> {
        Ok(self.conn().llen(&self.queue)?)
    }

    fn ping(&self) -> bool {
        match redis::cmd("PING").query::<String>(&mut *self.conn()) {
            Ok(pong) => pong == "PONG",
            Err(e) => {
                debug!("redis ping failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
