//! feedpulse: concurrent feed ingestion with normalized, deduplicated storage
//!
//! This crate fetches many JSON feeds in parallel, normalizes their
//! heterogeneous payloads into one item schema, and persists the result in
//! SQLite with idempotent upserts and an audit log of every fetch.

pub mod config;
pub mod fetch;
pub mod item;
pub mod normalize;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for feedpulse operations
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// Returns true if the database must be recreated before feedpulse can run again
    pub fn is_storage_fatal(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_fatal())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for feedpulse operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, Settings, SourceDescriptor};
pub use fetch::{FetchOutcome, Scheduler};
pub use item::{identifier, NormalizedItem};
pub use normalize::{normalize, FeedShape};
pub use state::TaskState;
