// src/enrich/cache.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// One stored summary. At most one per `item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSummary {
    pub item_id: String,
    pub title: String,
    pub body: Option<String>,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Key-value store for generated summaries.
///
/// `put` must be an atomic upsert at the storage layer: a second write for the
/// same key updates title/body/summary/updated_at in place and never inserts a
/// duplicate. Storage failures surface as `EnrichError::StorageUnavailable`.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    async fn get(&self, item_id: &str) -> Result<Option<CachedSummary>, EnrichError>;

    async fn put(
        &self,
        item_id: &str,
        title: &str,
        body: Option<&str>,
        summary_text: &str,
    ) -> Result<(), EnrichError>;

    /// Number of stored records (diagnostics/tests).
    async fn len(&self) -> Result<usize, EnrichError>;

    fn backend_name(&self) -> &'static str;
}

/// `updated_at` for a rewrite: never earlier than, and never equal to, the previous value.
pub(crate) fn next_updated_at_ms(now_ms: i64, previous_ms: Option<i64>) -> i64 {
    match previous_ms {
        Some(prev) if now_ms <= prev => prev + 1,
        _ => now_ms,
    }
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

/// Process-local backend. Upserts happen under one lock.
#[derive(Debug, Default)]
pub struct InMemorySummaryCache {
    inner: Mutex<HashMap<String, CachedSummary>>,
}

impl InMemorySummaryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryCache for InMemorySummaryCache {
    async fn get(&self, item_id: &str) -> Result<Option<CachedSummary>, EnrichError> {
        let g = self
            .inner
            .lock()
            .map_err(|_| EnrichError::StorageUnavailable("cache lock poisoned".into()))?;
        Ok(g.get(item_id).cloned())
    }

    async fn put(
        &self,
        item_id: &str,
        title: &str,
        body: Option<&str>,
        summary_text: &str,
    ) -> Result<(), EnrichError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut g = self
            .inner
            .lock()
            .map_err(|_| EnrichError::StorageUnavailable("cache lock poisoned".into()))?;

        match g.get_mut(item_id) {
            Some(existing) => {
                let updated = next_updated_at_ms(now_ms, Some(existing.updated_at.timestamp_millis()));
                existing.title = title.to_string();
                existing.body = body.map(str::to_string);
                existing.summary_text = summary_text.to_string();
                existing.updated_at = from_millis(updated);
            }
            None => {
                let ts = from_millis(now_ms);
                g.insert(
                    item_id.to_string(),
                    CachedSummary {
                        item_id: item_id.to_string(),
                        title: title.to_string(),
                        body: body.map(str::to_string),
                        summary_text: summary_text.to_string(),
                        created_at: ts,
                        updated_at: ts,
                    },
                );
            }
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize, EnrichError> {
        let g = self
            .inner
            .lock()
            .map_err(|_| EnrichError::StorageUnavailable("cache lock poisoned".into()))?;
        Ok(g.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updated_at_is_strictly_increasing() {
        assert_eq!(next_updated_at_ms(100, None), 100);
        assert_eq!(next_updated_at_ms(100, Some(50)), 100);
        assert_eq!(next_updated_at_ms(100, Some(100)), 101);
        assert_eq!(next_updated_at_ms(90, Some(100)), 101);
    }

    #[tokio::test]
    async fn upsert_keeps_one_record_and_latest_text() {
        let cache = InMemorySummaryCache::new();
        cache.put("abc", "Title", None, "first").await.unwrap();
        let first = cache.get("abc").await.unwrap().unwrap();
        cache
            .put("abc", "Title v2", Some("body"), "second")
            .await
            .unwrap();
        let second = cache.get("abc").await.unwrap().unwrap();

        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(second.summary_text, "second");
        assert_eq!(second.title, "Title v2");
        assert_eq!(second.body.as_deref(), Some("body"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = InMemorySummaryCache::new();
        assert!(cache.get("nope").await.unwrap().is_none());
    }
}
