//! Rendering of the aggregate per-source report

use crate::output::format::{format_as_csv, format_as_table, OutputFormat};
use crate::storage::SourceStats;

const HEADERS: [&str; 7] = [
    "Source",
    "Items",
    "Attempts",
    "Errors",
    "Error rate",
    "Last success",
    "Last error",
];

fn stats_row(stats: &SourceStats) -> Vec<String> {
    vec![
        stats.source.clone(),
        stats.item_count.to_string(),
        stats.total_attempts.to_string(),
        stats.error_count.to_string(),
        format!("{:.1}%", stats.error_rate()),
        stats.last_success.clone().unwrap_or_else(|| "never".to_string()),
        stats.last_error.clone().unwrap_or_default(),
    ]
}

/// Renders aggregate statistics in the requested format
pub fn render_stats(
    stats: &[SourceStats],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let rows: Vec<Vec<String>> = stats.iter().map(stats_row).collect();

    match format {
        OutputFormat::Table => {
            let total_items: u64 = stats.iter().map(|s| s.item_count).sum();
            Ok(format!(
                "{}{} sources, {} items stored\n",
                format_as_table(&HEADERS, &rows),
                stats.len(),
                total_items
            ))
        }
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(stats)?)),
        OutputFormat::Csv => Ok(format_as_csv(&HEADERS, &rows)),
    }
}
