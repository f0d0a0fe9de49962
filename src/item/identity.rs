//! Content-addressed item identifiers
//!
//! An item's identifier is the only thing deduplication looks at, so it is
//! derived from nothing but the source name and the item URL.

use sha2::{Digest, Sha256};

/// Derives the stable identifier for an item
///
/// Returns the hex-encoded SHA-256 of the source name and URL, separated by a
/// NUL byte so that `("ab", "c")` and `("a", "bc")` hash differently.
///
/// # Arguments
///
/// * `source` - The configured source name
/// * `url` - The item URL as produced by the normalizer
///
/// # Example
///
/// ```
/// use feedpulse::item::identifier;
///
/// let id = identifier("hackernews", "https://news.ycombinator.com/item?id=1");
/// assert_eq!(id.len(), 64);
/// assert_eq!(id, identifier("hackernews", "https://news.ycombinator.com/item?id=1"));
/// ```
pub fn identifier(source: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
