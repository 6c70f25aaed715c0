// tests/support/mod.rs
// Scripted upstream and storage doubles used by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feed_digest::upstream::transport::{ListingTransport, TransportError, TransportResponse};
use feed_digest::{
    CachedSummary, EnrichError, ListingQuery, RateLimiter, SummaryCache, UpstreamFetcher,
};
use serde_json::json;

type Responder = dyn Fn(&ListingQuery) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Answers every call through a closure and records the queries it saw.
pub struct ScriptedTransport {
    respond: Box<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ListingQuery>>,
}

impl ScriptedTransport {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&ListingQuery) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn slow<F>(delay: Duration, respond: F) -> Arc<Self>
    where
        F: Fn(&ListingQuery) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ListingQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn sources_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|q| q.source).collect()
    }
}

#[async_trait]
impl ListingTransport for ScriptedTransport {
    async fn get_listing(
        &self,
        query: &ListingQuery,
        _limit: u32,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(query.clone());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        (self.respond)(query)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn ok(body: String) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse { status: 200, body })
}

pub fn status(code: u16) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: code,
        body: String::new(),
    })
}

/// Upstream listing JSON with `(id, title)` children in the given order.
pub fn listing_json(items: &[(&str, &str)], after: Option<&str>, before: Option<&str>) -> String {
    let children: Vec<_> = items
        .iter()
        .map(|(id, title)| {
            json!({
                "kind": "t3",
                "data": {
                    "id": id,
                    "title": title,
                    "selftext": "",
                    "author": "tester",
                    "num_comments": 4,
                    "score": 17,
                    "created_utc": 1_700_000_000.0,
                    "subreddit": "data",
                    "permalink": format!("/r/data/comments/{id}/"),
                    "url": format!("https://example.test/{id}"),
                    "is_self": true
                }
            })
        })
        .collect();
    json!({
        "kind": "Listing",
        "data": { "children": children, "after": after, "before": before }
    })
    .to_string()
}

/// Numbered items with long enough titles.
pub fn numbered(prefix: &str, n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| (format!("{prefix}{i}"), format!("Substantive title number {i}")))
        .collect()
}

pub fn as_refs(v: &[(String, String)]) -> Vec<(&str, &str)> {
    v.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect()
}

pub fn roomy_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(1_000, Duration::from_secs(60)))
}

pub fn fetcher(transport: Arc<ScriptedTransport>) -> UpstreamFetcher {
    UpstreamFetcher::new(transport, roomy_limiter())
}

/// Summary store whose reads and/or writes fail with `StorageUnavailable`.
/// Reads that succeed always miss.
pub struct BrokenCache {
    fail_get: bool,
    pub puts: Mutex<usize>,
}

impl BrokenCache {
    pub fn failing_reads() -> Arc<Self> {
        Arc::new(Self {
            fail_get: true,
            puts: Mutex::new(0),
        })
    }

    pub fn failing_writes() -> Arc<Self> {
        Arc::new(Self {
            fail_get: false,
            puts: Mutex::new(0),
        })
    }

    pub fn put_attempts(&self) -> usize {
        *self.puts.lock().unwrap()
    }
}

#[async_trait]
impl SummaryCache for BrokenCache {
    async fn get(&self, _item_id: &str) -> Result<Option<CachedSummary>, EnrichError> {
        if self.fail_get {
            return Err(EnrichError::StorageUnavailable("disk unavailable".into()));
        }
        Ok(None)
    }

    async fn put(
        &self,
        _item_id: &str,
        _title: &str,
        _body: Option<&str>,
        _summary_text: &str,
    ) -> Result<(), EnrichError> {
        *self.puts.lock().unwrap() += 1;
        Err(EnrichError::StorageUnavailable("disk full".into()))
    }

    async fn len(&self) -> Result<usize, EnrichError> {
        Ok(0)
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}
