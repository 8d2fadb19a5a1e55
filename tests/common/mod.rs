// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hn_ranker::error::{FetchError, StoreError};
use hn_ranker::ingest::Fetcher;
use hn_ranker::item::{ExternalRecord, SkipReason, StoryFields};
use hn_ranker::store::{Entry, ItemStore};

/// Scriptable upstream: a candidate list plus one record per id.
#[derive(Default)]
pub struct MockFetcher {
    ids: Mutex<Vec<u64>>,
    records: Mutex<HashMap<u64, ExternalRecord>>,
    fail_list: AtomicBool,
    detail_calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_ids(&self, ids: &[u64]) {
        *self.ids.lock().unwrap() = ids.to_vec();
    }

    pub fn set_record(&self, id: u64, rec: ExternalRecord) {
        self.records.lock().unwrap().insert(id, rec);
    }

    pub fn set_story(&self, id: u64, score: u64, published_at: DateTime<Utc>) {
        self.set_record(id, story(&format!("Story {id}"), score, published_at));
    }

    pub fn fail_listing(&self, on: bool) {
        self.fail_list.store(on, Ordering::SeqCst);
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn list_candidate_ids(&self) -> Result<Vec<u64>, FetchError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("mock listing down".into()));
        }
        Ok(self.ids.lock().unwrap().clone())
    }

    async fn get_item_detail(&self, id: u64) -> Result<ExternalRecord, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("mock has no item {id}")))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub fn story(title: &str, score: u64, published_at: DateTime<Utc>) -> ExternalRecord {
    ExternalRecord::Story(StoryFields {
        title: title.to_string(),
        url: Some(format!("https://example.test/{}", title.replace(' ', "-"))),
        score,
        published_at,
    })
}

pub fn job() -> ExternalRecord {
    ExternalRecord::Other(SkipReason::NotAStory {
        kind: Some("job".into()),
    })
}

/// Item store whose every operation fails.
pub struct DownStore;

#[async_trait]
impl ItemStore for DownStore {
    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down for test".into()))
    }
    async fn get(&self, _key: &str) -> Result<Option<Entry>, StoreError> {
        Err(StoreError::Unavailable("down for test".into()))
    }
    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("down for test".into()))
    }
}

/// Poll `check` until it holds or `limit` passes.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
