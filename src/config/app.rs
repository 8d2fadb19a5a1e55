// src/config/app.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::hacker_news::{DEFAULT_BASE_URL, DEFAULT_FEED};

pub const DEFAULT_CONFIG_PATH: &str = "config/hn.toml";
pub const ENV_CONFIG_PATH: &str = "HN_CONFIG_PATH";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_feed() -> String {
    DEFAULT_FEED.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_item_ttl_secs() -> u64 {
    3600
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_process_workers() -> usize {
    4
}
fn default_one() -> usize {
    1
}
fn default_channel_capacity() -> usize {
    1024
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub workers: WorkerConfig,
    pub schedule: ScheduleConfig,
    pub http: HttpConfig,
}

/// `[source]`: upstream item API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "topstories" | "newstories" | "beststories"
    #[serde(default = "default_feed")]
    pub feed: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            feed: default_feed(),
            timeout_secs: default_timeout_secs(),
            max_candidates: None,
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 0 disables expiry.
    #[serde(default = "default_item_ttl_secs")]
    pub item_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Directory for snapshot files; snapshots stay in memory when unset.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            item_ttl_secs: default_item_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            snapshot_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn item_ttl(&self) -> Option<Duration> {
        (self.item_ttl_secs > 0).then(|| Duration::from_secs(self.item_ttl_secs))
    }
}

/// `[workers]`: independent worker tasks per endpoint group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_one")]
    pub fetch: usize,
    #[serde(default = "default_process_workers")]
    pub process: usize,
    #[serde(default = "default_one")]
    pub sort: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fetch: default_one(),
            process: default_process_workers(),
            sort: default_one(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// `[schedule]`: 0 leaves a ticker off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub fetch_interval_secs: u64,
    #[serde(default)]
    pub sort_interval_secs: u64,
}

impl ScheduleConfig {
    pub fn fetch_interval(&self) -> Option<Duration> {
        (self.fetch_interval_secs > 0).then(|| Duration::from_secs(self.fetch_interval_secs))
    }

    pub fn sort_interval(&self) -> Option<Duration> {
        (self.sort_interval_secs > 0).then(|| Duration::from_secs(self.sort_interval_secs))
    }
}

/// `[http]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics: default_true(),
        }
    }
}

impl AppConfig {
    /// Load `$HN_CONFIG_PATH` (or `config/hn.toml`), falling back to defaults
    /// when the file does not exist, then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HN_API_BASE_URL") {
            self.source.base_url = v;
        }
        if let Ok(v) = std::env::var("HN_FEED") {
            self.source.feed = v;
        }
        if let Some(v) = env_parse("HN_ITEM_TTL_SECS") {
            self.store.item_ttl_secs = v;
        }
        if let Ok(v) = std::env::var("HN_SNAPSHOT_DIR") {
            self.store.snapshot_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = env_parse("HN_PROCESS_WORKERS") {
            self.workers.process = v;
        }
        if let Some(v) = env_parse("HN_FETCH_INTERVAL_SECS") {
            self.schedule.fetch_interval_secs = v;
        }
        if let Some(v) = env_parse("HN_SORT_INTERVAL_SECS") {
            self.schedule.sort_interval_secs = v;
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "config", var = name, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}
