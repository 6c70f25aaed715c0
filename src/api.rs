use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::enrich::cache::{InMemorySummaryCache, SummaryCache};
use crate::enrich::generator::{build_generator, DynGenerator, SummaryRequest};
use crate::enrich::sqlite::SqliteSummaryCache;
use crate::enrich::{EnrichmentOrchestrator, SummaryOutcome};
use crate::error::{EnrichError, FetchError};
use crate::rate_limit::RateLimiter;
use crate::upstream::fallback::FallbackPolicy;
use crate::upstream::transport::{HttpTransport, ListingTransport};
use crate::upstream::types::{Item, ListingQuery, SortMode};
use crate::upstream::UpstreamFetcher;

#[derive(Clone)]
pub struct AppState {
    listings: FallbackPolicy,
    orchestrator: Arc<EnrichmentOrchestrator>,
    generator: DynGenerator,
    default_limit: i64,
}

impl AppState {
    pub fn new(
        listings: FallbackPolicy,
        orchestrator: Arc<EnrichmentOrchestrator>,
        generator: DynGenerator,
        default_limit: i64,
    ) -> Self {
        Self {
            listings,
            orchestrator,
            generator,
            default_limit,
        }
    }

    /// Wire the production stack from config: HTTP transport, shared limiter,
    /// SQLite (or in-memory) summary cache and the configured generator.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn ListingTransport> = Arc::new(HttpTransport::new(
            &cfg.upstream.base_url,
            &cfg.upstream.user_agent,
            cfg.upstream.timeout(),
        )?);
        let limiter = Arc::new(RateLimiter::new(
            cfg.rate_limit.max_requests,
            cfg.rate_limit.window(),
        ));
        tracing::info!(
            max_requests = limiter.max_requests(),
            window_ms = limiter.window_ms(),
            "upstream call budget"
        );
        let fetcher = UpstreamFetcher::new(transport, limiter).with_timeout(cfg.upstream.timeout());
        let listings = FallbackPolicy::new(fetcher, cfg.upstream.fallback_source.clone());

        let cache: Arc<dyn SummaryCache> = if cfg.summarizer.db_path == ":memory:" {
            Arc::new(InMemorySummaryCache::new())
        } else {
            Arc::new(SqliteSummaryCache::open(&cfg.summarizer.db_path)?)
        };
        let mut orchestrator = EnrichmentOrchestrator::new(cache);
        if cfg.summarizer.dedup_in_flight {
            orchestrator = orchestrator.with_in_flight_dedup();
        }

        let generator = build_generator(&cfg.summarizer)?;
        tracing::info!(
            fallback = %cfg.upstream.fallback_source,
            generator = generator.name(),
            api_key_len = cfg.summarizer.api_key.len(),
            "app state ready"
        );

        Ok(Self::new(
            listings,
            Arc::new(orchestrator),
            generator,
            cfg.upstream.default_limit,
        ))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/posts", get(list_posts))
        .route("/posts/default", get(default_posts))
        .route("/summarize", post(summarize))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Build the full router from config (used by the binary and HTTP tests).
pub fn router(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(create_router(AppState::from_config(cfg)?))
}

// ---- Listing ----

// Everything is optional text so that bad input reaches validation and is
// reported in-band instead of as an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ListingParams {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Display projection of an upstream item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemView {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub author: String,
    pub comments: u64,
    pub url: String,
    pub score: i64,
    pub subreddit: String,
    pub created: String,
}

impl From<Item> for ItemView {
    fn from(it: Item) -> Self {
        Self {
            author: format!("u/{}", it.author),
            url: format!("https://reddit.com{}", it.permalink),
            created: it.created_at.to_rfc3339(),
            id: it.id,
            title: it.title,
            content: it.body,
            comments: it.num_comments,
            score: it.score,
            subreddit: it.collection,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub items: Vec<ItemView>,
    pub after: Option<String>,
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ListingResponse {
    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Default::default()
        }
    }
}

async fn run_listing(state: &AppState, query: ListingQuery) -> ListingResponse {
    match state.listings.fetch(&query).await {
        Ok(outcome) => ListingResponse {
            items: outcome.page.items.into_iter().map(ItemView::from).collect(),
            after: outcome.page.after.map(|c| c.as_str().to_string()),
            before: outcome.page.before.map(|c| c.as_str().to_string()),
            served_by: Some(outcome.served_by),
            error: None,
        },
        Err(e) => ListingResponse::failed(e.user_message()),
    }
}

fn invalid_listing(message: &str) -> Json<ListingResponse> {
    let e = FetchError::InvalidArgument(message.into());
    Json(ListingResponse::failed(e.user_message()))
}

// Errors travel in-band (`error` field, empty items) so callers render one shape.
async fn list_posts(
    State(state): State<AppState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> Json<ListingResponse> {
    let params = match params {
        Ok(Query(p)) => p,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unparseable listing query");
            return invalid_listing("Invalid request parameters");
        }
    };
    let sort = match params.sort.as_deref().map(str::trim) {
        None | Some("") => SortMode::default(),
        Some(raw) => match raw.parse::<SortMode>() {
            Ok(s) => s,
            Err(_) => return invalid_listing("Invalid sort mode"),
        },
    };
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => state.default_limit,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => n,
            Err(_) => return invalid_listing("Limit must be a positive number"),
        },
    };
    let query = ListingQuery {
        source: params.source.trim().to_string(),
        sort,
        limit,
        after: params.after.filter(|s| !s.is_empty()).map(Into::into),
        before: params.before.filter(|s| !s.is_empty()).map(Into::into),
    };
    Json(run_listing(&state, query).await)
}

/// First page of the fallback source, hot, default limit.
async fn default_posts(State(state): State<AppState>) -> Json<ListingResponse> {
    let query = ListingQuery::first_page(
        state.listings.fallback_source(),
        SortMode::Hot,
        state.default_limit,
    );
    Json(run_listing(&state, query).await)
}

// ---- Summaries ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeReq {
    #[serde(default, alias = "postId")]
    pub item_id: String,
    #[serde(default, alias = "postTitle")]
    pub title: String,
    #[serde(default, alias = "postContent")]
    pub body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn enrich_status(e: &EnrichError) -> StatusCode {
    match e {
        EnrichError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        EnrichError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EnrichError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_reply(e: &EnrichError) -> (StatusCode, Json<ErrorBody>) {
    (
        enrich_status(e),
        Json(ErrorBody {
            error: e.user_message(),
        }),
    )
}

async fn summarize(
    State(state): State<AppState>,
    body: Result<Json<SummarizeReq>, JsonRejection>,
) -> Result<Json<SummaryOutcome>, (StatusCode, Json<ErrorBody>)> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "unparseable summarize body");
        error_reply(&EnrichError::InvalidArgument("Invalid request body".into()))
    })?;
    let request = SummaryRequest {
        item_id: body.item_id.trim().to_string(),
        title: body.title,
        body: body.body.filter(|b| !b.trim().is_empty()),
    };
    state
        .orchestrator
        .summarize(&request, state.generator.as_ref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(item_id = %request.item_id, error = %e, "summarize failed");
            error_reply(&e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn item_view_formats_author_url_and_date() {
        let item = Item {
            id: "abc".into(),
            title: "A worthy title".into(),
            body: None,
            author: "someone".into(),
            num_comments: 3,
            score: 10,
            created_at: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            collection: "data".into(),
            permalink: "/r/data/comments/abc/x/".into(),
            url: "https://example.test".into(),
            is_self: true,
        };
        let v = ItemView::from(item);
        assert_eq!(v.author, "u/someone");
        assert_eq!(v.url, "https://reddit.com/r/data/comments/abc/x/");
        assert_eq!(v.created, "2023-11-14T22:13:20+00:00");
        assert_eq!(v.subreddit, "data");
    }
}
