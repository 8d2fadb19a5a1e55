// src/ingest/processor.rs
use metrics::counter;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::ingest::types::Fetcher;
use crate::item::{item_key, ExternalRecord, Item, SkipReason};
use crate::store::ItemStore;

/// What happened to one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Stored(Item),
    Skipped(SkipReason),
}

/// Fetches one id, classifies it, and upserts the normalized item.
///
/// Every successful process overwrites the stored value wholesale, so
/// redelivery of the same id converges on the latest upstream state.
pub struct ItemProcessor {
    fetcher: Arc<dyn Fetcher>,
    items: Arc<dyn ItemStore>,
}

impl ItemProcessor {
    pub fn new(fetcher: Arc<dyn Fetcher>, items: Arc<dyn ItemStore>) -> Self {
        Self { fetcher, items }
    }

    pub async fn process(&self, id: u64) -> Result<ProcessOutcome, ServiceError> {
        let record = self.fetcher.get_item_detail(id).await?;

        let story = match record {
            ExternalRecord::Story(s) => s,
            ExternalRecord::Other(reason) => {
                counter!("hn_process_skipped_total").increment(1);
                tracing::debug!(target: "process", id, %reason, "skipped non-story item");
                return Ok(ProcessOutcome::Skipped(reason));
            }
        };

        let item = Item::from_story(id, story);
        let body = serde_json::to_vec(&item).map_err(|source| ServiceError::Encode {
            what: "item",
            source,
        })?;
        self.items.put(&item_key(id), body).await?;

        counter!("hn_process_stored_total").increment(1);
        tracing::info!(target: "process", id, score = item.score, title = %item.title, "stored item");
        Ok(ProcessOutcome::Stored(item))
    }

    /// Fire-and-forget mode: every failure ends here as a log line.
    pub async fn process_and_forget(&self, id: u64) {
        if let Err(e) = self.process(id).await {
            counter!("hn_process_errors_total").increment(1);
            tracing::warn!(target: "process", id, error = %e, "failed to process item");
        }
    }
}
