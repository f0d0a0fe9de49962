//! Normalizer: raw feed bytes to `NormalizedItem`s
//!
//! This module turns a source's response body into items in the common schema:
//! - Explicit dispatch on the source's `FeedShape`
//! - Envelope detection only for sources configured without a shape
//! - Loose coercion of scalar fields and timestamps
//! - Per-item degradation: a bad entry becomes a warning, not a failed feed
//!
//! Failures are reported through [`NormalizeResult`], never as `Err`.

mod coerce;
mod shapes;
mod timestamp;

pub use coerce::coerce_string;
pub use timestamp::{normalize_timestamp, normalize_timestamp_str};

use crate::item::NormalizedItem;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Warning emitted for a valid payload that contains no entries
pub const NO_ITEMS_WARNING: &str = "no items";

/// The closed set of payload structures the normalizer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedShape {
    /// `[1, 2, 3]` - bare item ids
    ListOfIds,

    /// `{"items": [{...}]}`
    NestedItemsArray,

    /// `{"data": {"children": [{"data": {...}}]}}`
    NestedChildrenArray,

    /// `[{...}, {...}]`
    FlatObjectArray,
}

impl FeedShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListOfIds => "list-of-ids",
            Self::NestedItemsArray => "nested-items-array",
            Self::NestedChildrenArray => "nested-children-array",
            Self::FlatObjectArray => "flat-object-array",
        }
    }

    pub fn all() -> [FeedShape; 4] {
        [
            Self::ListOfIds,
            Self::NestedItemsArray,
            Self::NestedChildrenArray,
            Self::FlatObjectArray,
        ]
    }
}

impl fmt::Display for FeedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|shape| shape.as_str() == s)
            .ok_or_else(|| format!("unknown feed shape: {}", s))
    }
}

/// Per-source normalization switches
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Attach the raw JSON of each entry to its item
    pub keep_raw: bool,

    /// Drop items past this count
    pub max_items: Option<usize>,
}

/// Output of [`normalize`]
#[derive(Debug, Clone, Default)]
pub struct NormalizeResult {
    /// Items in payload order
    pub items: Vec<NormalizedItem>,

    /// Per-item and feed-level warnings, in the order they were produced
    pub warnings: Vec<String>,

    /// Set when the whole payload was rejected (invalid JSON, wrong envelope)
    pub feed_error: Option<String>,
}

impl NormalizeResult {
    fn feed_failure(message: String) -> Self {
        Self {
            items: Vec::new(),
            warnings: vec![message.clone()],
            feed_error: Some(message),
        }
    }

    /// Returns true if the payload as a whole could not be used
    pub fn is_feed_failure(&self) -> bool {
        self.feed_error.is_some()
    }
}

/// Normalizes a response body with default options
///
/// # Arguments
///
/// * `source` - Source name, used for item identifiers
/// * `shape` - Configured shape, or `None` to detect from the envelope
/// * `raw` - Response body bytes
///
/// # Example
///
/// ```
/// use feedpulse::normalize::{normalize, FeedShape};
///
/// let result = normalize("hn", Some(FeedShape::ListOfIds), b"[1,2,3]");
/// assert_eq!(result.items.len(), 3);
/// assert!(result.warnings.is_empty());
/// ```
pub fn normalize(source: &str, shape: Option<FeedShape>, raw: &[u8]) -> NormalizeResult {
    normalize_with_options(source, shape, raw, &NormalizeOptions::default())
}

/// Normalizes a response body
///
/// Invalid JSON or an envelope that does not match the shape rejects the whole
/// payload with a single warning. Entries missing a usable title or URL are
/// skipped with one warning each. A valid payload with no entries yields the
/// [`NO_ITEMS_WARNING`] warning.
pub fn normalize_with_options(
    source: &str,
    shape: Option<FeedShape>,
    raw: &[u8],
    options: &NormalizeOptions,
) -> NormalizeResult {
    let doc: serde_json::Value = match serde_json::from_slice(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("Malformed JSON from {}: {}", source, e);
            return NormalizeResult::feed_failure(format!("malformed JSON: {}", e));
        }
    };

    let shape = match shape {
        Some(shape) => shape,
        None => match shapes::detect_shape(&doc) {
            Some(detected) => {
                tracing::debug!("Detected shape '{}' for untagged source {}", detected, source);
                detected
            }
            None => {
                return NormalizeResult::feed_failure("unrecognized feed structure".to_string())
            }
        },
    };

    let output = match shapes::parse_shape(shape, source, &doc, options) {
        Ok(output) => output,
        Err(message) => return NormalizeResult::feed_failure(message),
    };

    let mut warnings = output.warnings;
    if output.entries == 0 {
        warnings.push(NO_ITEMS_WARNING.to_string());
    }

    let mut items = output.items;
    if let Some(max) = options.max_items {
        if items.len() > max {
            tracing::debug!("Keeping {} of {} items from {}", max, items.len(), source);
            items.truncate(max);
        }
    }

    NormalizeResult {
        items,
        warnings,
        feed_error: None,
    }
}
