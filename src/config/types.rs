use crate::normalize::FeedShape;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRY_MAX: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_STORAGE_PATH: &str = "feedpulse.db";
pub const DEFAULT_USER_AGENT: &str = "feedpulse/1.0";

/// Main configuration structure for feedpulse
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDescriptor>,
}

/// Cycle-wide fetch settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Maximum number of sources fetched at once
    pub max_concurrency: usize,

    /// Per-attempt request timeout unless the source overrides it
    pub default_timeout_secs: u64,

    /// Retries after the first attempt
    pub retry_max: u32,

    /// Backoff delay before the first retry (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Path to the SQLite database file
    pub storage_path: String,

    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_max: DEFAULT_RETRY_MAX,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// One remote feed to fetch
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceDescriptor {
    /// Unique source name
    pub name: String,

    pub url: String,

    /// Payload shape; `None` detects it from the response envelope
    #[serde(default)]
    pub shape: Option<FeedShape>,

    /// Overrides `Settings::default_timeout_secs`
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Keep a raw JSON snapshot on every item
    #[serde(default)]
    pub keep_raw: bool,

    /// Keep at most this many items per fetch, in payload order
    #[serde(default)]
    pub max_items: Option<usize>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Creates a descriptor with no overrides
    pub fn new(name: &str, url: &str, shape: Option<FeedShape>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            shape,
            timeout_secs: None,
            keep_raw: false,
            max_items: None,
            headers: BTreeMap::new(),
        }
    }

    /// Per-attempt timeout for this source
    pub fn timeout(&self, settings: &Settings) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(settings.default_timeout_secs))
    }
}
