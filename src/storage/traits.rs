//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::item::NormalizedItem;
use crate::storage::{AuditRecord, SourceStats};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// The variants separate what a caller can do about the failure:
/// retry shortly (`Transient`), give up and recreate the store (`Fatal`),
/// or report it (`Write` and the rest).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database is busy or locked: {0}")]
    Transient(String),

    #[error("Database is corrupted or unreadable: {0} (delete the database file to recreate it)")]
    Fatal(String),

    #[error("Database write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true if the operation may succeed when retried after a short delay
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true if the store cannot be used any more
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(ffi_err, _) => Some(ffi_err.code),
            _ => None,
        };

        match code {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Transient(err.to_string())
            }
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                Self::Fatal(err.to_string())
            }
            _ => Self::Write(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Implementations must be safe to call from several worker tasks at once;
/// each mutating call is its own transaction.
pub trait Storage {
    // ===== Items =====

    /// Inserts or replaces a batch of items atomically
    ///
    /// An existing row with the same identifier has its title, url, timestamp,
    /// tags and raw payload replaced; its `created_at` is kept. Within one batch
    /// the last item for an identifier wins. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// * `ConstraintViolation` - An identifier already belongs to a different source
    fn upsert_items(&self, items: &[NormalizedItem]) -> StorageResult<()>;

    /// Counts committed items for a source
    fn count_items(&self, source: &str) -> StorageResult<u64>;

    /// Counts all committed items
    fn count_all_items(&self) -> StorageResult<u64>;

    /// Lists stored items, newest timestamp first
    ///
    /// # Arguments
    ///
    /// * `source` - Only items from this source
    /// * `since` - Only items whose timestamp sorts at or after this RFC 3339 value
    fn get_items(
        &self,
        source: Option<&str>,
        since: Option<&str>,
    ) -> StorageResult<Vec<NormalizedItem>>;

    // ===== Audit Log =====

    /// Appends one fetch attempt to the audit log
    fn log_attempt(&self, record: &AuditRecord) -> StorageResult<()>;

    /// Returns the audit log for a source in insertion order
    fn get_audit_log(&self, source: &str) -> StorageResult<Vec<AuditRecord>>;

    // ===== Statistics =====

    /// Per-source summary joining stored items with the audit log
    ///
    /// Sources that only appear in the audit log are included with zero items.
    fn aggregate_stats(&self) -> StorageResult<Vec<SourceStats>>;
}
