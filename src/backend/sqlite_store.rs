//! Embedded dedup store: one SQLite file, one table per namespace.
//!
//! Each operation opens the file, does its work and closes it again, so the store holds no
//! connection between calls and several processes can share the file.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::CacheStore;
use crate::error::{CollectError, CollectResult};
use crate::utils::config::CacheStoreConsts;

pub struct SqliteCacheStore {
    db_path: PathBuf,
    /// Quoted table name derived from the namespace.
    table: String,
}

/// Namespaces become table names; keep them to identifier characters.
fn table_for_namespace(namespace: &str) -> Result<String> {
    anyhow::ensure!(
        !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "cache namespace {:?} must be non-empty [A-Za-z0-9_]",
        namespace
    );
    Ok(format!("\"{namespace}\""))
}

/// Enable WAL and create the bucket table (idempotent).
fn apply_wal_and_schema(conn: &Connection, table: &str) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")
        .context("set WAL pragmas")?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (path TEXT PRIMARY KEY, ts INTEGER NOT NULL);"
    ))
    .context("create bucket")?;
    Ok(())
}

impl SqliteCacheStore {
    /// Create the file and bucket if missing.
    pub fn open(db_path: &Path, namespace: &str) -> Result<Self> {
        let table = table_for_namespace(namespace)?;
        let conn = Connection::open(db_path)
            .with_context(|| format!("open cache db {}", db_path.display()))?;
        apply_wal_and_schema(&conn, &table)?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
            table,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> CollectResult<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| CollectError::CacheIo(format!("open backend cache db failed: {e}")))?;
        conn.busy_timeout(Duration::from_millis(CacheStoreConsts::BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }
}

impl CacheStore for SqliteCacheStore {
    fn lookup(&self, key: &str) -> CollectResult<Option<i64>> {
        let conn = self.connect()?;
        let ts = conn
            .query_row(
                &format!("SELECT ts FROM {} WHERE path = ?1", self.table),
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(ts)
    }

    fn record(&self, key: &str, timestamp: i64) -> CollectResult<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (path, ts) VALUES (?1, ?2)",
                self.table
            ),
            (key, timestamp),
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CollectResult<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE path = ?1", self.table),
            [key],
        )?;
        Ok(())
    }

    fn entries(&self) -> CollectResult<Vec<(String, i64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT path, ts FROM {}", self.table))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn record_many(&self, entries: &[(String, i64)]) -> CollectResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (path, ts) VALUES (?1, ?2)",
                self.table
            ))?;
            for (key, ts) in entries {
                stmt.execute((key.as_str(), *ts))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
