// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod upstream;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, router, AppState};
pub use crate::enrich::cache::{CachedSummary, InMemorySummaryCache, SummaryCache};
pub use crate::enrich::sqlite::SqliteSummaryCache;
pub use crate::enrich::{EnrichmentOrchestrator, SummaryOutcome};
pub use crate::error::{EnrichError, FetchError};
pub use crate::rate_limit::{Clock, ManualClock, RateLimiter, SystemClock};
pub use crate::upstream::fallback::{FallbackOutcome, FallbackPolicy};
pub use crate::upstream::types::{Cursor, Item, ListingPage, ListingQuery, SortMode};
pub use crate::upstream::UpstreamFetcher;
