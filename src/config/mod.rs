//! Configuration module for feedpulse
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The fetch core only consumes [`Settings`] and [`SourceDescriptor`], so both
//! can be built directly without going through a file.
//!
//! # Example
//!
//! ```no_run
//! use feedpulse::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("feedpulse.toml")).unwrap();
//! println!("Fetching with concurrency {}", config.settings.max_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, Settings, SourceDescriptor, DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX, DEFAULT_STORAGE_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
