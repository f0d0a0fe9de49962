//! Shared table and CSV formatting

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::fmt;
use std::str::FromStr;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!(
                "unknown format '{}' (expected table, json or csv)",
                other
            )),
        }
    }
}

/// Renders rows as a rounded UTF-8 table
pub(crate) fn format_as_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.to_vec());

    for row in rows {
        table.add_row(row.clone());
    }

    format!("{}\n", table)
}

/// Renders rows as CSV with a header line
pub(crate) fn format_as_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut output = String::new();

    output.push_str(
        &headers
            .iter()
            .map(|h| csv_escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    output.push('\n');

    for row in rows {
        let escaped: Vec<String> = row.iter().map(|v| csv_escape(v)).collect();
        output.push_str(&escaped.join(","));
        output.push('\n');
    }

    output
}

/// Quotes a CSV field if it contains a separator, quote or line break
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
