//! Rendering of fetch cycle outcomes

use crate::fetch::FetchOutcome;
use crate::output::format::{format_as_csv, format_as_table, OutputFormat};
use serde::Serialize;

const HEADERS: [&str; 8] = [
    "Source", "Status", "Items", "New", "Warnings", "Attempts", "Duration (ms)", "Error",
];

/// Totals over one cycle's outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub items: u64,
    pub new_items: u64,
}

impl CycleSummary {
    /// Tallies a set of outcomes
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };

        for outcome in outcomes {
            if outcome.success {
                summary.succeeded += 1;
            } else if outcome.is_cancelled() {
                summary.cancelled += 1;
            } else {
                summary.failed += 1;
            }
            summary.items += outcome.item_count;
            summary.new_items += outcome.new_item_count;
        }

        summary
    }

    /// True when there was at least one source and none succeeded
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.succeeded == 0
    }
}

fn outcome_row(outcome: &FetchOutcome) -> Vec<String> {
    vec![
        outcome.source.clone(),
        outcome.state.to_string(),
        outcome.item_count.to_string(),
        outcome.new_item_count.to_string(),
        outcome.warnings.len().to_string(),
        outcome.attempts.to_string(),
        outcome.duration.as_millis().to_string(),
        outcome.error.clone().unwrap_or_default(),
    ]
}

/// Renders cycle outcomes in the requested format
///
/// # Arguments
///
/// * `outcomes` - Outcomes in source order
/// * `format` - Output format
///
/// # Returns
///
/// * `Ok(String)` - Rendered report, newline-terminated
/// * `Err(serde_json::Error)` - JSON serialization failed
pub fn render_outcomes(
    outcomes: &[FetchOutcome],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let rows: Vec<Vec<String>> = outcomes.iter().map(outcome_row).collect();

    match format {
        OutputFormat::Table => {
            let summary = CycleSummary::from_outcomes(outcomes);
            Ok(format!(
                "{}{} sources: {} ok, {} failed, {} cancelled; {} items ({} new)\n",
                format_as_table(&HEADERS, &rows),
                summary.total,
                summary.succeeded,
                summary.failed,
                summary.cancelled,
                summary.items,
                summary.new_items
            ))
        }
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(outcomes)?)),
        OutputFormat::Csv => Ok(format_as_csv(&HEADERS, &rows)),
    }
}
