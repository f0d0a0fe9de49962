//! Storage module for persisting fetch results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent item upserts keyed by content-addressed identifier
//! - The append-only audit log of fetch attempts
//! - Read-side aggregation for reporting

mod schema;
mod sqlite;
mod traits;

pub(crate) use sqlite::now_rfc3339;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Status of a logged fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Error,
}

impl AttemptStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One row of the audit log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub source: String,
    /// RFC 3339 UTC, millisecond precision
    pub attempted_at: String,
    pub status: AttemptStatus,
    pub item_count: u64,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

/// Per-source summary produced by [`Storage::aggregate_stats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub source: String,
    /// Items currently stored for the source
    pub item_count: u64,
    /// Audit rows with status `error`
    pub error_count: u64,
    /// All audit rows
    pub total_attempts: u64,
    /// Time of the latest successful attempt
    pub last_success: Option<String>,
    /// Time of the latest attempt of any status
    pub last_attempt: Option<String>,
    /// Message of the latest failed attempt
    pub last_error: Option<String>,
}

impl SourceStats {
    /// Percentage of attempts that failed
    pub fn error_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.error_count as f64 / self.total_attempts as f64 * 100.0
        }
    }
}
