//! feed-digest: binary entrypoint
//! Boots the Axum HTTP server: listings behind the rate limiter + fallback,
//! summaries behind the persistent cache, and `/metrics`.

use anyhow::Context;
use feed_digest::{api, config::AppConfig, metrics::Metrics};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs. `RUST_LOG` wins over the built-in filter.
/// `FEED_LOG_JSON=1` switches to JSON lines for log shippers.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed_digest=info,warn"));

    let json = std::env::var("FEED_LOG_JSON").is_ok_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    // The deployment runtime may already have installed a subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load().context("loading feed config")?;
    let metrics = Metrics::init(&cfg)?;
    let router = api::router(&cfg)?.merge(metrics.router());

    tracing::info!("feed-digest router ready");
    Ok(router.into())
}
