// src/rank/top.rs
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::item::Item;
use crate::store::{SnapshotInfo, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPosts {
    pub count: usize,
    pub posts: Vec<Item>,
}

/// Most recently modified snapshot; equal timestamps prefer the greater name.
pub fn latest(infos: &[SnapshotInfo]) -> Option<&SnapshotInfo> {
    infos
        .iter()
        .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
}

/// Reads the newest ranked snapshot. Never writes.
pub struct TopQuery {
    snapshots: Arc<dyn SnapshotStore>,
}

impl TopQuery {
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { snapshots }
    }

    pub async fn top(&self, n: i64) -> Result<TopPosts, ServiceError> {
        if n < 1 {
            return Err(ServiceError::InvalidArgument(
                "count must be a positive integer".into(),
            ));
        }

        let infos = self.snapshots.list().await.map_err(|e| {
            tracing::error!(target: "top", error = %e, "failed to list snapshots");
            ServiceError::from(e)
        })?;
        let Some(newest) = latest(&infos) else {
            return Err(ServiceError::NotFound("no ranked snapshots yet".into()));
        };

        let data = match self.snapshots.get(&newest.name).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                return Err(ServiceError::NotFound(format!(
                    "snapshot {} disappeared",
                    newest.name
                )))
            }
            Err(e) => {
                tracing::error!(target: "top", name = %newest.name, error = %e, "failed to read snapshot");
                return Err(e.into());
            }
        };

        let mut posts: Vec<Item> =
            serde_json::from_slice(&data).map_err(|source| ServiceError::Decode {
                what: "ranked snapshot",
                source,
            })?;
        posts.truncate(usize::try_from(n).unwrap_or(usize::MAX));

        tracing::info!(target: "top", count = posts.len(), requested = n, "retrieved top posts");
        Ok(TopPosts {
            count: posts.len(),
            posts,
        })
    }
}
