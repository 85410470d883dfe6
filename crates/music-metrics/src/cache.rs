use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::value::MetricResult;

/// SQLite-backed cache of computed metric results.
///
/// Keyed by `(content_hash, request_key, version)`. Bumping the algorithm
/// version makes older rows invisible; they stay until evicted.
pub struct ResultCache {
    connection: Mutex<Connection>,
}

impl ResultCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("creating cache directory")?;
        }
        let connection = Connection::open(db_path).context("opening metric cache db")?;
        Self::init(connection)
    }

    /// A private cache that lives as long as the value.
    pub fn in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("opening in-memory cache")?;
        Self::init(connection)
    }

    fn init(connection: Connection) -> Result<Self> {
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS metric_results (
                    content_hash TEXT NOT NULL,
                    request_key  TEXT NOT NULL,
                    version      INTEGER NOT NULL,
                    created_at   TEXT NOT NULL,
                    result_json  TEXT NOT NULL,
                    PRIMARY KEY (content_hash, request_key, version)
                );",
            )
            .context("creating cache tables")?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))
    }

    pub fn get(
        &self,
        content_hash: &str,
        request_key: &str,
        version: u32,
    ) -> Result<Option<MetricResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT result_json FROM metric_results
             WHERE content_hash = ?1 AND request_key = ?2 AND version = ?3",
        )?;

        let row = stmt.query_row(params![content_hash, request_key, version], |row| {
            row.get::<_, String>(0)
        });

        match row {
            Ok(json) => {
                let result = serde_json::from_str(&json).context("deserializing cached result")?;
                Ok(Some(result))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("querying metric cache"),
        }
    }

    pub fn put(
        &self,
        content_hash: &str,
        request_key: &str,
        version: u32,
        result: &MetricResult,
    ) -> Result<()> {
        let json = serde_json::to_string(result).context("serializing result for cache")?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn()?.execute(
            "INSERT OR REPLACE INTO metric_results
                (content_hash, request_key, version, created_at, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![content_hash, request_key, version, now, json],
        )?;

        Ok(())
    }

    /// Drop every cached result for a file, across requests and versions.
    pub fn evict(&self, content_hash: &str) -> Result<usize> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM metric_results WHERE content_hash = ?1",
                params![content_hash],
            )
            .context("evicting cached results")?;
        Ok(removed)
    }

    /// Number of rows for a file, all versions included.
    pub fn count(&self, content_hash: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM metric_results WHERE content_hash = ?1",
            params![content_hash],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MetricValue;
    use crate::MetricError;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> MetricResult {
        let mut result = MetricResult::new();
        result.insert("melodic_entropy", json!(2.585).into());
        result.insert(
            "tension_curve",
            MetricValue::error("tension_curve", MetricError::Computation("bad".into())),
        );
        result
    }

    #[test]
    fn cache_miss_returns_none() {
        let cache = ResultCache::in_memory().unwrap();
        assert!(cache.get("abc", "all|all|", 1).unwrap().is_none());
    }

    #[test]
    fn put_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::open(&dir.path().join("nested/cache.db")).unwrap();
        cache.put("abc", "melodic|global|", 1, &sample()).unwrap();

        let cached = cache.get("abc", "melodic|global|", 1).unwrap().unwrap();
        assert_eq!(cached, sample());
    }

    #[test]
    fn keys_are_distinct() {
        let cache = ResultCache::in_memory().unwrap();
        cache.put("abc", "melodic|global|", 1, &sample()).unwrap();

        assert!(cache.get("abc", "melodic|global|piano", 1).unwrap().is_none());
        assert!(cache.get("abc", "melodic|global|", 2).unwrap().is_none());
        assert!(cache.get("def", "melodic|global|", 1).unwrap().is_none());
    }

    #[test]
    fn evict_removes_every_request() {
        let cache = ResultCache::in_memory().unwrap();
        cache.put("abc", "melodic|global|", 1, &sample()).unwrap();
        cache.put("abc", "all|all|", 1, &sample()).unwrap();
        cache.put("def", "all|all|", 1, &sample()).unwrap();

        assert_eq!(cache.evict("abc").unwrap(), 2);
        assert_eq!(cache.count("abc").unwrap(), 0);
        assert_eq!(cache.count("def").unwrap(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        ResultCache::open(&path)
            .unwrap()
            .put("abc", "k", 1, &sample())
            .unwrap();

        assert!(ResultCache::open(&path).unwrap().get("abc", "k", 1).unwrap().is_some());
    }
}
