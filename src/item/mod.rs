//! Normalized item model
//!
//! Every source shape is reduced to a `NormalizedItem` before it reaches storage.

mod identity;

pub use identity::identifier;

use serde::Serialize;

/// A single feed entry in the common schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedItem {
    /// Deterministic identifier derived from `(source, url)`
    pub id: String,

    /// Non-empty display title
    pub title: String,

    /// Non-empty item URL
    pub url: String,

    /// Name of the source this item came from
    pub source: String,

    /// RFC 3339 timestamp, or the original text when it could not be parsed
    pub timestamp: Option<String>,

    /// Ordered tags; empty when the source provides none
    pub tags: Vec<String>,

    /// Compact JSON of the raw element, kept only when the source asks for it
    pub raw_payload: Option<String>,

    /// First-seen time, assigned by storage
    pub created_at: Option<String>,
}

impl NormalizedItem {
    /// Creates an item and derives its identifier
    pub fn new(source: &str, title: String, url: String) -> Self {
        Self {
            id: identifier(source, &url),
            title,
            url,
            source: source.to_string(),
            timestamp: None,
            tags: Vec::new(),
            raw_payload: None,
            created_at: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_raw_payload(mut self, raw: Option<String>) -> Self {
        self.raw_payload = raw;
        self
    }
}
