// src/rank/ranker.rs
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::ServiceError;
use crate::item::{Item, IDS_LATEST_KEY, SNAPSHOT_NAME_PREFIX};
use crate::rank::window::TrailingWindow;
use crate::store::{ItemStore, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub name: String,
    pub items: usize,
    pub window: TrailingWindow,
}

/// Snapshot key for the UTC calendar day of `now`. Rebuilding on the same
/// day replaces that day's snapshot.
pub fn snapshot_name(now: DateTime<Utc>) -> String {
    format!("{SNAPSHOT_NAME_PREFIX}{}", now.format("%Y-%m-%d"))
}

/// Keep items inside `window`, highest score first, equal scores by id ascending.
pub fn rank(items: Vec<Item>, window: &TrailingWindow) -> Vec<Item> {
    let mut kept: Vec<Item> = items
        .into_iter()
        .filter(|it| window.contains(it.published_at))
        .collect();
    kept.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
    kept
}

/// Scans the item store and writes one ranked snapshot per invocation.
///
/// Reads are key by key with no isolation, so concurrent upserts can land on
/// either side of the scan. The item store is never written.
pub struct Ranker {
    items: Arc<dyn ItemStore>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl Ranker {
    pub fn new(
        items: Arc<dyn ItemStore>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            items,
            snapshots,
            clock,
        }
    }

    pub async fn build_snapshot(&self) -> Result<SnapshotSummary, ServiceError> {
        self.build_snapshot_at(self.clock.now()).await
    }

    pub async fn build_snapshot_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SnapshotSummary, ServiceError> {
        let t0 = std::time::Instant::now();
        let window = TrailingWindow::ending_at(now);

        let keys = self.items.keys().await.map_err(|e| {
            tracing::error!(target: "rank", error = %e, "failed to list item keys");
            ServiceError::from(e)
        })?;

        let mut items = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|k| k.as_str() != IDS_LATEST_KEY) {
            let entry = match self.items.get(key).await {
                Ok(Some(e)) => e,
                // expired between listing and reading
                Ok(None) => continue,
                Err(e) => {
                    counter!("hn_rank_decode_errors_total").increment(1);
                    tracing::error!(target: "rank", %key, error = %e, "failed to read item");
                    continue;
                }
            };
            match serde_json::from_slice::<Item>(&entry.value) {
                Ok(it) => items.push(it),
                Err(e) => {
                    counter!("hn_rank_decode_errors_total").increment(1);
                    tracing::error!(target: "rank", %key, error = %e, "failed to decode item");
                }
            }
        }

        let ranked = rank(items, &window);
        let report = serde_json::to_vec_pretty(&ranked).map_err(|source| ServiceError::Encode {
            what: "ranked snapshot",
            source,
        })?;

        let name = snapshot_name(now);
        self.snapshots.put(&name, report).await.map_err(|e| {
            tracing::error!(target: "rank", %name, error = %e, "failed to store snapshot");
            ServiceError::from(e)
        })?;

        counter!("hn_rank_snapshots_total").increment(1);
        gauge!("hn_rank_snapshot_items").set(ranked.len() as f64);
        histogram!("hn_rank_build_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(target: "rank", %name, items = ranked.len(), "stored ranked snapshot");

        Ok(SnapshotSummary {
            name,
            items: ranked.len(),
            window,
        })
    }
}
