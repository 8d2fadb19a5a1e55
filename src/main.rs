//! Hacker News ranking service: binary entrypoint.
//! Boots the pipeline workers and serves the command surface over Axum.

use std::sync::Arc;

use hn_ranker::clock::SystemClock;
use hn_ranker::config::AppConfig;
use hn_ranker::ingest::HackerNewsClient;
use hn_ranker::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact local logs, only when HN_DEV_LOG=1.
/// The hosted runtime installs its own subscriber otherwise.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("HN_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");
    if !dev_flag {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hn_ranker=debug,info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = AppConfig::load()?;
    // Recorder goes in before any series is described or touched.
    let metrics = if cfg.http.metrics {
        Some(Metrics::init(cfg.store.item_ttl_secs)?)
    } else {
        None
    };

    let fetcher = Arc::new(HackerNewsClient::from_config(&cfg.source)?);
    let app = hn_ranker::app(&cfg, fetcher, Arc::new(SystemClock)).await?;

    let mut router = app.router;
    if let Some(m) = &metrics {
        router = router.merge(hn_ranker::api::metrics_router(m.handle.clone()));
    }

    tracing::info!(
        feed = %cfg.source.feed,
        process_workers = cfg.workers.process,
        "hacker news ranking service started"
    );
    Ok(router.into())
}
