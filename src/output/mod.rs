//! Output module for rendering cycle results and reports
//!
//! This module handles:
//! - Rendering per-source fetch outcomes after a cycle
//! - Rendering the aggregate per-source report from storage
//! - Listing configured sources with their stored state
//! - Exporting stored items
//! - Table, JSON and CSV output formats

mod format;
mod items;
mod outcomes;
mod report;
mod sources;

pub use format::{csv_escape, OutputFormat};
pub use outcomes::{render_outcomes, CycleSummary};
pub use items::render_items;
pub use report::render_stats;
pub use sources::{render_sources, SourceHealth, SourceStatus};
