//! State module for tracking fetch progress
//!
//! This module provides the state machine each source task walks through during a fetch cycle.
//!
//! # Components
//!
//! - `TaskState`: Tracks one source task (pending, fetching, retrying, success, failed, cancelled)

mod task_state;

pub use task_state::TaskState;
