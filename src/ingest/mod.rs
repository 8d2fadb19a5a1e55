// src/ingest/mod.rs
pub mod dispatcher;
pub mod hacker_news;
pub mod processor;
pub mod types;

pub use dispatcher::Dispatcher;
pub use hacker_news::HackerNewsClient;
pub use processor::{ItemProcessor, ProcessOutcome};
pub use types::Fetcher;

use crate::error::ServiceError;

/// Parse an item id sent as text (`"8863"`, surrounding whitespace allowed).
pub fn parse_id(raw: &[u8]) -> Result<u64, ServiceError> {
    let s = std::str::from_utf8(raw)
        .map_err(|_| ServiceError::InvalidArgument("id is not valid utf-8".into()))?
        .trim();
    s.parse::<u64>()
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid id {s:?}")))
}
