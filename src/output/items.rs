//! Rendering of stored items for export

use crate::item::NormalizedItem;
use crate::output::format::{format_as_csv, format_as_table, OutputFormat};

const HEADERS: [&str; 5] = ["Source", "Title", "URL", "Timestamp", "Tags"];

fn item_row(item: &NormalizedItem) -> Vec<String> {
    vec![
        item.source.clone(),
        item.title.clone(),
        item.url.clone(),
        item.timestamp.clone().unwrap_or_default(),
        item.tags.join(";"),
    ]
}

/// Renders stored items in the requested format
///
/// JSON carries every field, including identifiers and raw payloads.
pub fn render_items(
    items: &[NormalizedItem],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let rows: Vec<Vec<String>> = items.iter().map(item_row).collect();

    match format {
        OutputFormat::Table => Ok(format!(
            "{}{} items\n",
            format_as_table(&HEADERS, &rows),
            items.len()
        )),
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(items)?)),
        OutputFormat::Csv => Ok(format_as_csv(&HEADERS, &rows)),
    }
}
