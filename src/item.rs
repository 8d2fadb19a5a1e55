// src/item.rs
//! Upstream item documents, their classification, and the normalized [`Item`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved item-store key holding the latest raw candidate id list.
pub const IDS_LATEST_KEY: &str = "hn_ids_latest";

pub const ITEM_KEY_PREFIX: &str = "hn_post_";
pub const SNAPSHOT_NAME_PREFIX: &str = "hn_posts_";

/// The only upstream type that gets ranked.
pub const RANKED_KIND: &str = "story";

const DISCUSSION_URL: &str = "https://news.ycombinator.com/item?id=";

pub fn item_key(id: u64) -> String {
    format!("{ITEM_KEY_PREFIX}{id}")
}

/// Normalized record of one ranked story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub score: u64,
    #[serde(rename = "time")]
    pub published_at: DateTime<Utc>,
}

impl Item {
    pub fn from_story(id: u64, story: StoryFields) -> Self {
        let url = story
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("{DISCUSSION_URL}{id}"));
        Self {
            id,
            title: story.title,
            url,
            score: story.score,
            published_at: story.published_at,
        }
    }
}

/// Upstream item document as served by the item endpoint. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub score: Option<i64>,
    /// unix seconds
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryFields {
    pub title: String,
    pub url: Option<String>,
    pub score: u64,
    pub published_at: DateTime<Utc>,
}

/// Why an upstream record was not materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Upstream answered `null` (deleted or never existed)
    Missing,
    NotAStory { kind: Option<String> },
    MissingField(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("no such item"),
            Self::NotAStory { kind: Some(k) } => write!(f, "not a story ({k})"),
            Self::NotAStory { kind: None } => f.write_str("not a story (untyped)"),
            Self::MissingField(name) => write!(f, "missing field {name}"),
        }
    }
}

/// Upstream record, decoded once and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalRecord {
    Story(StoryFields),
    Other(SkipReason),
}

impl ExternalRecord {
    pub fn from_raw(raw: Option<RawItem>) -> Self {
        let Some(raw) = raw else {
            return Self::Other(SkipReason::Missing);
        };
        if raw.kind.as_deref() != Some(RANKED_KIND) {
            return Self::Other(SkipReason::NotAStory { kind: raw.kind });
        }
        // only an absent title skips; blank stays blank
        let Some(title) = raw.title.map(|t| normalize_title(&t)) else {
            return Self::Other(SkipReason::MissingField("title"));
        };
        let Some(score) = raw.score else {
            return Self::Other(SkipReason::MissingField("score"));
        };
        let Some(published_at) = raw.time.and_then(|s| DateTime::from_timestamp(s, 0)) else {
            return Self::Other(SkipReason::MissingField("time"));
        };
        Self::Story(StoryFields {
            title,
            url: raw.url,
            score: score.max(0) as u64,
            published_at,
        })
    }
}

/// Decode HTML entities, collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    let decoded = html_escape::decode_html_entities(s);
    re_ws.replace_all(&decoded, " ").trim().to_string()
}
