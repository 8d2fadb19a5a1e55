// src/ingest/types.rs
use async_trait::async_trait;

use crate::error::FetchError;
use crate::item::ExternalRecord;

/// Where candidate ids and item details come from.
///
/// Neither call is retried here; a failed fetch is reported and the caller
/// decides whether to try again.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn list_candidate_ids(&self) -> Result<Vec<u64>, FetchError>;
    async fn get_item_detail(&self, id: u64) -> Result<ExternalRecord, FetchError>;
    fn name(&self) -> &'static str;
}
