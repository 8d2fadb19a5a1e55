// src/scheduler.rs
//! Periodic `fetch-ids` and `sort` tickers. Each tick is one independent unit
//! of work; a failed tick is logged and the next one runs on schedule.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::service::HnService;

pub fn spawn_fetch_scheduler(service: Arc<HnService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.fetch_ids().await {
                Ok(msg) => tracing::info!(target: "scheduler", %msg, "fetch tick"),
                Err(e) => tracing::warn!(target: "scheduler", error = %e, "fetch tick failed"),
            }
        }
    })
}

pub fn spawn_sort_scheduler(service: Arc<HnService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.ranker().build_snapshot().await {
                Ok(s) => tracing::info!(
                    target: "scheduler",
                    name = %s.name,
                    items = s.items,
                    "sort tick"
                ),
                Err(e) => tracing::warn!(target: "scheduler", error = %e, "sort tick failed"),
            }
        }
    })
}
