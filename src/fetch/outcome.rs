//! Per-source result of a fetch cycle

use crate::state::TaskState;
use crate::storage::{AttemptStatus, AuditRecord};
use serde::Serialize;
use std::time::Duration;

/// Terminal record of one source's participation in a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub source: String,

    pub success: bool,

    /// Terminal task state: success, failed or cancelled
    pub state: TaskState,

    /// Wall time from the first request to the terminal state
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,

    /// Items produced by normalization
    pub item_count: u64,

    /// Rows added to the store by this cycle (best-effort delta)
    pub new_item_count: u64,

    pub error: Option<String>,

    /// Per-item normalization warnings, in payload order
    pub warnings: Vec<String>,

    /// HTTP attempts made, 0 when cancelled before the first request
    pub attempts: u32,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl FetchOutcome {
    pub fn success(
        source: &str,
        duration: Duration,
        attempts: u32,
        item_count: u64,
        new_item_count: u64,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            source: source.to_string(),
            success: true,
            state: TaskState::Success,
            duration,
            item_count,
            new_item_count,
            error: None,
            warnings,
            attempts,
        }
    }

    pub fn failed(
        source: &str,
        duration: Duration,
        attempts: u32,
        error: String,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            source: source.to_string(),
            success: false,
            state: TaskState::Failed,
            duration,
            item_count: 0,
            new_item_count: 0,
            error: Some(error),
            warnings,
            attempts,
        }
    }

    pub fn cancelled(source: &str, duration: Duration, attempts: u32) -> Self {
        Self {
            source: source.to_string(),
            success: false,
            state: TaskState::Cancelled,
            duration,
            item_count: 0,
            new_item_count: 0,
            error: Some("cancelled".to_string()),
            warnings: Vec::new(),
            attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == TaskState::Cancelled
    }

    /// Builds the audit row for this outcome
    ///
    /// Returns `None` for a source cancelled before it sent any request.
    pub fn audit_record(&self, attempted_at: &str) -> Option<AuditRecord> {
        if self.is_cancelled() && self.attempts == 0 {
            return None;
        }

        let status = if self.success {
            AttemptStatus::Success
        } else {
            AttemptStatus::Error
        };

        Some(AuditRecord {
            source: self.source.clone(),
            attempted_at: attempted_at.to_string(),
            status,
            item_count: self.item_count,
            error_message: self.error.clone(),
            duration_ms: self.duration.as_millis() as u64,
        })
    }
}
