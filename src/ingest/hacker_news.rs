// src/ingest/hacker_news.rs
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::Fetcher;
use crate::item::{ExternalRecord, RawItem};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_FEED: &str = "topstories";

/// Client for the public Hacker News item API.
pub struct HackerNewsClient {
    base_url: String,
    feed: String,
    max_candidates: Option<usize>,
    client: reqwest::Client,
}

impl HackerNewsClient {
    pub fn new(base_url: impl Into<String>, feed: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, feed, Duration::from_secs(10))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        feed: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building hacker news http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            feed: feed.into(),
            max_candidates: None,
            client,
        })
    }

    pub fn from_config(cfg: &SourceConfig) -> anyhow::Result<Self> {
        let mut c = Self::with_timeout(
            cfg.base_url.clone(),
            cfg.feed.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?;
        c.max_candidates = cfg.max_candidates;
        Ok(c)
    }

    pub fn feed_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.feed)
    }

    pub fn item_url(&self, id: u64) -> String {
        format!("{}/item/{id}.json", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = match resp.text().await {
            Ok(b) => b,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };
        serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

#[async_trait]
impl Fetcher for HackerNewsClient {
    async fn list_candidate_ids(&self) -> Result<Vec<u64>, FetchError> {
        let mut ids: Vec<u64> = self.get_json(self.feed_url()).await?;
        if let Some(max) = self.max_candidates {
            ids.truncate(max);
        }
        Ok(ids)
    }

    async fn get_item_detail(&self, id: u64) -> Result<ExternalRecord, FetchError> {
        let raw: Option<RawItem> = self.get_json(self.item_url(id)).await?;
        Ok(ExternalRecord::from_raw(raw))
    }

    fn name(&self) -> &'static str {
        "hacker-news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_base_and_feed() {
        let c = HackerNewsClient::new("http://hn.test/v0/", "newstories").unwrap();
        assert_eq!(c.feed_url(), "http://hn.test/v0/newstories.json");
        assert_eq!(c.item_url(8863), "http://hn.test/v0/item/8863.json");
    }

    #[test]
    fn config_carries_candidate_cap() {
        let cfg = SourceConfig {
            base_url: "http://hn.test/v0".into(),
            max_candidates: Some(30),
            ..SourceConfig::default()
        };
        let c = HackerNewsClient::from_config(&cfg).unwrap();
        assert_eq!(c.max_candidates, Some(30));
        assert_eq!(c.feed_url(), "http://hn.test/v0/topstories.json");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let c = HackerNewsClient::with_timeout(
            "http://127.0.0.1:9/v0",
            DEFAULT_FEED,
            Duration::from_millis(500),
        )
        .unwrap();
        let err = c.list_candidate_ids().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
    }
}
