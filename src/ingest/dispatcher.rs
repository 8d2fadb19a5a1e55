// src/ingest/dispatcher.rs
use bytes::Bytes;
use metrics::counter;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::error::ServiceError;
use crate::item::IDS_LATEST_KEY;
use crate::store::ItemStore;

/// Fans a batch of candidate ids out as one message per id.
///
/// There is no join: the batch is done once every id has been handed to the
/// bus, whether or not any worker has processed it yet.
pub struct Dispatcher {
    items: Arc<dyn ItemStore>,
    bus: Arc<dyn MessageBus>,
    subject: String,
}

impl Dispatcher {
    pub fn new(items: Arc<dyn ItemStore>, bus: Arc<dyn MessageBus>, subject: impl Into<String>) -> Self {
        Self {
            items,
            bus,
            subject: subject.into(),
        }
    }

    /// Persist the raw id list, then publish each id. Returns the batch size.
    ///
    /// Only the list write can fail the call; a failed publish loses that one id.
    pub async fn dispatch(&self, ids: &[u64]) -> Result<usize, ServiceError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let raw = serde_json::to_vec(ids).map_err(|source| ServiceError::Encode {
            what: "candidate id list",
            source,
        })?;
        if let Err(e) = self.items.put(IDS_LATEST_KEY, raw).await {
            tracing::error!(target: "dispatch", error = %e, "failed to store candidate ids");
            return Err(e.into());
        }

        let mut failed = 0usize;
        for id in ids {
            let payload = Bytes::from(id.to_string());
            if let Err(e) = self.bus.publish(&self.subject, payload).await {
                failed += 1;
                tracing::warn!(target: "dispatch", id, error = %e, "failed to publish id for processing");
            }
        }

        counter!("hn_dispatch_ids_total").increment((ids.len() - failed) as u64);
        counter!("hn_dispatch_publish_errors_total").increment(failed as u64);
        tracing::info!(target: "dispatch", count = ids.len(), failed, "dispatched candidate ids");
        Ok(ids.len())
    }
}
