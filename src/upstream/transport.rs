// src/upstream/transport.rs
use std::time::Duration;

use async_trait::async_trait;

use crate::upstream::types::ListingQuery;

/// Raw upstream answer before classification.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Performs one HTTP round-trip for a listing query. Status classification and
/// body parsing happen in the fetcher, so tests can swap in canned responses.
#[async_trait]
pub trait ListingTransport: Send + Sync {
    async fn get_listing(
        &self,
        query: &ListingQuery,
        limit: u32,
    ) -> Result<TransportResponse, TransportError>;

    fn name(&self) -> &'static str;
}

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "feed-digest/0.1 (listing reader)";

/// `reqwest`-backed transport against `{base}/r/{source}/{sort}.json`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn listing_url(&self, query: &ListingQuery) -> String {
        format!(
            "{}/r/{}/{}.json",
            self.base_url,
            query.source,
            query.sort.as_str()
        )
    }
}

/// Query parameters in the order the upstream documents them.
pub fn listing_params(query: &ListingQuery, limit: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string()), ("raw_json", "1".to_string())];
    for (k, v) in query.sort.extra_params() {
        params.push((k, v.to_string()));
    }
    if let Some(after) = &query.after {
        params.push(("after", after.as_str().to_string()));
    }
    if let Some(before) = &query.before {
        params.push(("before", before.as_str().to_string()));
    }
    params
}

#[async_trait]
impl ListingTransport for HttpTransport {
    async fn get_listing(
        &self,
        query: &ListingQuery,
        limit: u32,
    ) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .get(self.listing_url(query))
            .query(&listing_params(query, limit))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify_reqwest)?;
        Ok(TransportResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(e.to_string())
    }
}
