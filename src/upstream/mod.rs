// src/upstream/mod.rs
pub mod fallback;
pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use crate::upstream::transport::{ListingTransport, TransportError};
use crate::upstream::types::{Cursor, Item, ListingPage, ListingQuery, RawListing};

/// Titles with this many characters or fewer are not substantive.
pub const MIN_TITLE_CHARS: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_LIMIT: i64 = 12;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Listing fetches that reached upstream.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Listing fetch failures by error kind."
        );
        describe_counter!(
            "feed_rate_limited_total",
            "Fetches rejected by the local call budget."
        );
        describe_counter!("feed_fallback_total", "Fallback source attempts.");
        describe_histogram!("feed_fetch_ms", "Upstream round-trip time in milliseconds.");
    });
}

/// Source names: alphanumeric/underscore, 3..=21 chars.
pub fn validate_source(source: &str) -> bool {
    static RE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_]{3,21}$").expect("static source regex compiles")
    });
    re.is_match(source)
}

fn is_substantive(item: &Item) -> bool {
    item.title.chars().count() > MIN_TITLE_CHARS
}

/// Parse an upstream listing body, drop non-substantive entries, cap at `limit`.
/// Cursors are copied verbatim.
pub fn parse_listing(body: &str, limit: usize) -> Result<ListingPage, FetchError> {
    let raw: RawListing =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let items = raw
        .data
        .children
        .into_iter()
        .filter_map(|c| c.data.into_item())
        .filter(is_substantive)
        .take(limit)
        .collect();

    Ok(ListingPage {
        items,
        after: raw.data.after.map(Cursor::from),
        before: raw.data.before.map(Cursor::from),
    })
}

/// Map a non-success status onto the error taxonomy.
pub fn classify_status(status: u16) -> FetchError {
    match status {
        404 => FetchError::SourceNotFound,
        403 => FetchError::SourceForbidden,
        _ => FetchError::UpstreamUnavailable {
            status: Some(status),
        },
    }
}

/// Performs one rate-limited, time-bounded listing request.
#[derive(Clone)]
pub struct UpstreamFetcher {
    transport: Arc<dyn ListingTransport>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl UpstreamFetcher {
    pub fn new(transport: Arc<dyn ListingTransport>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport,
            limiter,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch_page(&self, query: &ListingQuery) -> Result<ListingPage, FetchError> {
        ensure_metrics_described();

        let result = self.fetch_page_inner(query).await;
        if let Err(e) = &result {
            counter!("feed_fetch_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(
                source = %query.source,
                sort = query.sort.as_str(),
                error = %e,
                "listing fetch failed"
            );
        }
        result
    }

    async fn fetch_page_inner(&self, query: &ListingQuery) -> Result<ListingPage, FetchError> {
        if query.limit <= 0 {
            return Err(FetchError::InvalidArgument(
                "Limit must be a positive number".into(),
            ));
        }
        if !validate_source(&query.source) {
            return Err(FetchError::InvalidArgument("Invalid subreddit name".into()));
        }
        let limit = u32::try_from(query.limit).unwrap_or(u32::MAX);

        if let Err(e) = self.limiter.admit() {
            counter!("feed_rate_limited_total").increment(1);
            return Err(e);
        }

        counter!("feed_fetch_total").increment(1);
        let t0 = Instant::now();
        let call = self.transport.get_listing(query, limit);
        let resp = match tokio::time::timeout(self.timeout, call).await {
            Err(_elapsed) => return Err(FetchError::Timeout),
            Ok(Err(TransportError::Timeout)) => return Err(FetchError::Timeout),
            Ok(Err(TransportError::Failed(msg))) => {
                tracing::debug!(transport = self.transport.name(), %msg, "transport failure");
                return Err(FetchError::UpstreamUnavailable { status: None });
            }
            Ok(Ok(resp)) => resp,
        };
        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        if !(200..300).contains(&resp.status) {
            return Err(classify_status(resp.status));
        }

        let page = parse_listing(&resp.body, limit as usize)?;
        tracing::debug!(
            source = %query.source,
            sort = query.sort.as_str(),
            items = page.items.len(),
            has_after = page.after.is_some(),
            has_before = page.before.is_some(),
            "listing fetched"
        );
        Ok(page)
    }
}
