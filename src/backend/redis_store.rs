//! Networked dedup store: a Redis hash named by the namespace, `field = path`, `value = ts`.

use anyhow::Result;
use redis::Commands;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{CacheStore, connect_redis};
use crate::error::{CollectError, CollectResult};

pub struct RedisCacheStore {
    conn: Mutex<redis::Connection>,
    namespace: String,
}

fn cache_err(e: redis::RedisError) -> CollectError {
    CollectError::CacheIo(e.to_string())
}

impl RedisCacheStore {
    pub fn connect(url: &str, namespace: &str) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(connect_redis(url)?),
            namespace: namespace.to_string(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, redis::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for RedisCacheStore {
    fn lookup(&self, key: &str) -> CollectResult<Option<i64>> {
        self.conn().hget(&self.namespace, key).map_err(cache_err)
    }

    fn record(&self, key: &str, timestamp: i64) -> CollectResult<()> {
        self.conn()
            .hset::<_, _, _, ()>(&self.namespace, key, timestamp)
            .map_err(cache_err)
    }

    fn remove(&self, key: &str) -> CollectResult<()> {
        self.conn()
            .hdel::<_, _, ()>(&self.namespace, key)
            .map_err(cache_err)
    }

    fn entries(&self) -> CollectResult<Vec<(String, i64)>> {
        let all: HashMap<String, i64> = self.conn().hgetall(&self.namespace).map_err(cache_err)?;
        Ok(all.into_iter().collect())
    }

    fn record_many(&self, entries: &[(String, i64)]) -> CollectResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.conn()
            .hset_multiple::<_, _, _, ()>(&self.namespace, entries)
            .map_err(cache_err)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
