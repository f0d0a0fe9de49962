//! Fetch module: HTTP, retries and the cycle scheduler
//!
//! This module provides:
//! - HTTP fetching with per-attempt timeouts and error classification
//! - Exponential backoff with jitter
//! - The bounded-concurrency scheduler that runs one fetch cycle

mod backoff;
mod fetcher;
mod outcome;
mod scheduler;

pub use backoff::{backoff_delay, random_jitter, RetryPolicy, JITTER_RATIO};
pub use fetcher::{build_http_client, fetch_source, FetchError};
pub use outcome::FetchOutcome;
pub use scheduler::Scheduler;
