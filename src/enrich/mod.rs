// src/enrich/mod.rs
//! Enrichment orchestration: cache first, generate on miss, persist on success.

pub mod cache;
pub mod generator;
pub mod sqlite;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::enrich::cache::SummaryCache;
use crate::enrich::generator::{SummaryGenerator, SummaryRequest};
use crate::error::EnrichError;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("summary_cache_hits_total", "Summaries served from cache.");
        describe_counter!(
            "summary_cache_misses_total",
            "Summary requests that needed generation."
        );
        describe_counter!(
            "summary_generation_failures_total",
            "Generation calls that failed or returned blank text."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutcome {
    pub summary_text: String,
    pub served_from_cache: bool,
}

type InFlight = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Drops the map entry for `key` once no other task holds or waits on it.
/// Also runs when a waiter is cancelled while parked on the lock.
struct EntryCleanup<'a> {
    map: &'a InFlight,
    key: String,
}

impl Drop for EntryCleanup<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(|p| p.into_inner());
        if map
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(&self.key);
        }
    }
}

/// Holds the per-item lock. Fields drop in order: lock first, then cleanup.
struct KeyGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _cleanup: EntryCleanup<'a>,
}

/// Serves summaries from `SummaryCache`, generating and storing them on a miss.
pub struct EnrichmentOrchestrator {
    cache: Arc<dyn SummaryCache>,
    in_flight: Option<InFlight>,
}

impl EnrichmentOrchestrator {
    pub fn new(cache: Arc<dyn SummaryCache>) -> Self {
        Self {
            cache,
            in_flight: None,
        }
    }

    /// Concurrent requests for the same item wait for the first one and then
    /// read its result from the cache instead of generating again.
    pub fn with_in_flight_dedup(mut self) -> Self {
        self.in_flight = Some(Mutex::new(HashMap::new()));
        self
    }

    pub fn cache(&self) -> &Arc<dyn SummaryCache> {
        &self.cache
    }

    async fn lock_key(&self, key: &str) -> Option<KeyGuard<'_>> {
        let map = self.in_flight.as_ref()?;
        let entry = {
            let mut g = map.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(g.entry(key.to_string()).or_default())
        };
        let cleanup = EntryCleanup {
            map,
            key: key.to_string(),
        };
        let guard = entry.lock_owned().await;
        Some(KeyGuard {
            _guard: guard,
            _cleanup: cleanup,
        })
    }

    async fn cached(&self, item_id: &str) -> Result<Option<SummaryOutcome>, EnrichError> {
        Ok(self.cache.get(item_id).await?.map(|hit| {
            counter!("summary_cache_hits_total").increment(1);
            tracing::debug!(item_id, "summary cache hit");
            SummaryOutcome {
                summary_text: hit.summary_text,
                served_from_cache: true,
            }
        }))
    }

    /// Return the cached summary for `item_id`, or run `generate` and store its
    /// (trimmed, non-blank) result. `generate` is never called on a cache hit.
    pub async fn get_or_create_summary<F, Fut>(
        &self,
        item_id: &str,
        title: &str,
        body: Option<&str>,
        generate: F,
    ) -> Result<SummaryOutcome, EnrichError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        ensure_metrics_described();

        if item_id.trim().is_empty() || title.trim().is_empty() {
            return Err(EnrichError::InvalidArgument(
                "Post ID and title are required".into(),
            ));
        }

        if let Some(hit) = self.cached(item_id).await? {
            return Ok(hit);
        }

        let key_guard = self.lock_key(item_id).await;
        if key_guard.is_some() {
            // someone may have finished while we waited
            if let Some(hit) = self.cached(item_id).await? {
                return Ok(hit);
            }
        }

        counter!("summary_cache_misses_total").increment(1);
        tracing::debug!(item_id, "summary cache miss, generating");

        let summary = match generate().await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                counter!("summary_generation_failures_total").increment(1);
                tracing::warn!(item_id, error = %e, "summary generation failed");
                return Err(EnrichError::GenerationFailed(e.to_string()));
            }
        };
        if summary.is_empty() {
            counter!("summary_generation_failures_total").increment(1);
            tracing::warn!(item_id, "summary generation returned blank text");
            return Err(EnrichError::GenerationFailed("blank summary".into()));
        }

        self.cache.put(item_id, title, body, &summary).await?;

        Ok(SummaryOutcome {
            summary_text: summary,
            served_from_cache: false,
        })
    }

    /// Convenience wrapper that uses a `SummaryGenerator` as the generation call.
    pub async fn summarize(
        &self,
        request: &SummaryRequest,
        generator: &dyn SummaryGenerator,
    ) -> Result<SummaryOutcome, EnrichError> {
        self.get_or_create_summary(
            &request.item_id,
            &request.title,
            request.body.as_deref(),
            || generator.generate(request),
        )
        .await
    }
}
