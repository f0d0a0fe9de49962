//! Rendering of configured sources joined with their stored state

use crate::config::SourceDescriptor;
use crate::output::format::{format_as_csv, format_as_table, OutputFormat};
use crate::storage::SourceStats;
use serde::Serialize;
use std::fmt;

const HEADERS: [&str; 6] = ["Source", "URL", "Shape", "Items", "Status", "Last fetch"];
const URL_WIDTH: usize = 50;

/// Where a configured source stands according to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceHealth {
    /// At least one successful fetch on record
    Active,
    /// Attempted, never succeeded
    Errors,
    /// No audit rows at all
    NotFetched,
}

impl SourceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Errors => "errors",
            Self::NotFetched => "not fetched",
        }
    }
}

impl fmt::Display for SourceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured source with its stored item count and health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: String,
    pub url: String,
    /// Configured shape, `None` when detected per response
    pub shape: Option<String>,
    pub item_count: u64,
    pub status: SourceHealth,
    pub last_fetch: Option<String>,
}

impl SourceStatus {
    /// Matches a configured source against the aggregate statistics
    pub fn from_config(source: &SourceDescriptor, stats: &[SourceStats]) -> Self {
        let found = stats.iter().find(|s| s.source == source.name);
        let status = match found {
            Some(s) if s.last_success.is_some() => SourceHealth::Active,
            Some(s) if s.total_attempts > 0 => SourceHealth::Errors,
            _ => SourceHealth::NotFetched,
        };

        Self {
            source: source.name.clone(),
            url: source.url.clone(),
            shape: source.shape.map(|s| s.as_str().to_string()),
            item_count: found.map_or(0, |s| s.item_count),
            status,
            last_fetch: found.and_then(|s| s.last_attempt.clone()),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Renders every configured source, in config order, with its stored state
pub fn render_sources(
    sources: &[SourceDescriptor],
    stats: &[SourceStats],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let statuses: Vec<SourceStatus> = sources
        .iter()
        .map(|source| SourceStatus::from_config(source, stats))
        .collect();

    match format {
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = statuses
                .iter()
                .map(|s| {
                    vec![
                        s.source.clone(),
                        truncate(&s.url, URL_WIDTH),
                        s.shape.clone().unwrap_or_else(|| "auto-detect".to_string()),
                        s.item_count.to_string(),
                        s.status.to_string(),
                        s.last_fetch.clone().unwrap_or_else(|| "never".to_string()),
                    ]
                })
                .collect();
            Ok(format_as_table(&HEADERS, &rows))
        }
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&statuses)?)),
        OutputFormat::Csv => {
            let rows: Vec<Vec<String>> = statuses
                .iter()
                .map(|s| {
                    vec![
                        s.source.clone(),
                        s.url.clone(),
                        s.shape.clone().unwrap_or_default(),
                        s.item_count.to_string(),
                        s.status.to_string(),
                        s.last_fetch.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            Ok(format_as_csv(&HEADERS, &rows))
        }
    }
}
