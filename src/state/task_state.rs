/// Source task state definitions for tracking fetch progress
///
/// This module defines all states a source task can pass through during one fetch cycle.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a source task within a fetch cycle
///
/// Transitions:
///
/// ```text
/// Pending -> Fetching -> Success
///                     -> Retrying -> Fetching
///                     -> Failed
/// (any non-terminal) -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    // ===== Active States =====
    /// Task is waiting for a concurrency slot
    Pending,

    /// An HTTP request is in flight
    Fetching,

    /// Last attempt failed transiently; sleeping before the next attempt
    Retrying,

    // ===== Terminal States =====
    /// Payload was fetched and normalized
    Success,

    /// Retries exhausted or a non-retryable error occurred
    Failed,

    /// The cycle was cancelled before this task reached another terminal state
    Cancelled,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        match (*self, next) {
            (Pending, Fetching) => true,
            (Fetching, Success) | (Fetching, Retrying) | (Fetching, Failed) => true,
            (Retrying, Fetching) => true,
            (state, Cancelled) => state.is_active(),
            _ => false,
        }
    }

    /// Returns the lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
