// src/upstream/fallback.rs
//! Retry-once against a fallback source when the requested one is missing or
//! forbidden. The fallback never replaces the original error: if it fails too,
//! the caller sees what went wrong with the source they asked for.

use metrics::counter;

use crate::error::FetchError;
use crate::upstream::types::{ListingPage, ListingQuery};
use crate::upstream::UpstreamFetcher;

/// Which source actually served a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub page: ListingPage,
    pub served_by: String,
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct FallbackPolicy {
    fetcher: UpstreamFetcher,
    fallback_source: String,
}

impl FallbackPolicy {
    pub fn new(fetcher: UpstreamFetcher, fallback_source: impl Into<String>) -> Self {
        Self {
            fetcher,
            fallback_source: fallback_source.into(),
        }
    }

    pub fn fallback_source(&self) -> &str {
        &self.fallback_source
    }

    /// Fetch using the configured fallback source.
    pub async fn fetch(&self, query: &ListingQuery) -> Result<FallbackOutcome, FetchError> {
        self.fetch_with_fallback(query, &self.fallback_source).await
    }

    /// Fetch `query.source`; on `SourceNotFound`/`SourceForbidden` retry exactly
    /// once against `fallback_source`.
    ///
    /// Cursors belong to the source that issued them, so requests carrying a
    /// cursor are never redirected.
    pub async fn fetch_with_fallback(
        &self,
        query: &ListingQuery,
        fallback_source: &str,
    ) -> Result<FallbackOutcome, FetchError> {
        let original = match self.fetcher.fetch_page(query).await {
            Ok(page) => {
                return Ok(FallbackOutcome {
                    page,
                    served_by: query.source.clone(),
                    used_fallback: false,
                })
            }
            Err(e) => e,
        };

        if !original.is_source_specific() || query.source == fallback_source {
            return Err(original);
        }
        if query.has_cursor() {
            tracing::info!(
                source = %query.source,
                "not falling back: request carries a cursor from the original source"
            );
            return Err(original);
        }

        counter!("feed_fallback_total").increment(1);
        tracing::info!(
            source = %query.source,
            fallback = %fallback_source,
            error = %original,
            "trying fallback source"
        );

        match self.fetcher.fetch_page(&query.for_source(fallback_source)).await {
            Ok(page) => Ok(FallbackOutcome {
                page,
                served_by: fallback_source.to_string(),
                used_fallback: true,
            }),
            Err(fallback_err) => {
                tracing::warn!(
                    source = %query.source,
                    fallback = %fallback_source,
                    error = %fallback_err,
                    "fallback source also failed"
                );
                Err(original)
            }
        }
    }
}
