// src/enrich/sqlite.rs
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::enrich::cache::{from_millis, CachedSummary, SummaryCache};
use crate::error::EnrichError;

const SCHEMA: &str = "BEGIN;
CREATE TABLE IF NOT EXISTS post_summaries(
    item_id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    body TEXT,
    summary_text TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
COMMIT;";

// updated_at only moves forward, even when two writes land in the same millisecond.
const UPSERT: &str = "INSERT INTO post_summaries(item_id, title, body, summary_text, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT(item_id) DO UPDATE SET
    title = excluded.title,
    body = excluded.body,
    summary_text = excluded.summary_text,
    updated_at = MAX(excluded.updated_at, post_summaries.updated_at + 1)";

/// SQLite-backed summary store. Blocking calls run on the tokio blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteSummaryCache {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

fn storage_err(e: impl std::fmt::Display) -> EnrichError {
    EnrichError::StorageUnavailable(e.to_string())
}

impl SqliteSummaryCache {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EnrichError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(storage_err)?;
        }
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, EnrichError> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, EnrichError> {
        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        tracing::info!(path = ?db_path, "summary cache ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, EnrichError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| storage_err("connection lock poisoned"))?;
            f(&guard).map_err(storage_err)
        })
        .await
        .map_err(storage_err)?
    }
}

#[async_trait]
impl SummaryCache for SqliteSummaryCache {
    async fn get(&self, item_id: &str) -> Result<Option<CachedSummary>, EnrichError> {
        let key = item_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT item_id, title, body, summary_text, created_at, updated_at
                 FROM post_summaries WHERE item_id = ?1",
                params![key],
                |row| {
                    Ok(CachedSummary {
                        item_id: row.get(0)?,
                        title: row.get(1)?,
                        body: row.get(2)?,
                        summary_text: row.get(3)?,
                        created_at: from_millis(row.get(4)?),
                        updated_at: from_millis(row.get(5)?),
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn put(
        &self,
        item_id: &str,
        title: &str,
        body: Option<&str>,
        summary_text: &str,
    ) -> Result<(), EnrichError> {
        let (id, title, body, text) = (
            item_id.to_string(),
            title.to_string(),
            body.map(str::to_string),
            summary_text.to_string(),
        );
        let now_ms = Utc::now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(UPSERT, params![id, title, body, text, now_ms])
                .map(|_| ())
        })
        .await
    }

    async fn len(&self) -> Result<usize, EnrichError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(1) FROM post_summaries", [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as usize)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let cache = SqliteSummaryCache::open_in_memory().unwrap();
        cache.put("p1", "A title", None, "one").await.unwrap();
        let first = cache.get("p1").await.unwrap().unwrap();
        cache.put("p1", "A title", None, "one").await.unwrap();
        let second = cache.get("p1").await.unwrap().unwrap();

        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn body_round_trips_as_nullable() {
        let cache = SqliteSummaryCache::open_in_memory().unwrap();
        cache.put("p1", "A title", Some("text"), "s").await.unwrap();
        cache.put("p2", "B title", None, "s").await.unwrap();
        assert_eq!(
            cache.get("p1").await.unwrap().unwrap().body.as_deref(),
            Some("text")
        );
        assert_eq!(cache.get("p2").await.unwrap().unwrap().body, None);
    }
}
