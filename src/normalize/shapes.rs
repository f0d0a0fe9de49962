//! One parser per supported payload shape
//!
//! Each parser receives the already-decoded JSON document, checks the
//! envelope, then walks the entries. An envelope mismatch is a feed-level
//! failure; a bad entry only produces a warning for that position.

use crate::item::NormalizedItem;
use crate::normalize::coerce::{first_string_field, string_field, string_list, type_name};
use crate::normalize::timestamp::normalize_timestamp;
use crate::normalize::{FeedShape, NormalizeOptions};
use serde_json::{Map, Value};

/// Per-shape parse output, before the empty-feed check
#[derive(Debug, Default)]
pub(crate) struct ShapeOutput {
    pub items: Vec<NormalizedItem>,
    pub warnings: Vec<String>,
    /// Number of raw entries seen in the payload
    pub entries: usize,
}

impl ShapeOutput {
    fn skip(&mut self, index: usize, reason: impl std::fmt::Display) {
        self.warnings.push(format!("item {}: {}", index, reason));
    }
}

/// Dispatches to the parser for `shape`
///
/// # Returns
///
/// * `Ok(ShapeOutput)` - Envelope matched, entries processed
/// * `Err(String)` - Envelope did not match the shape
pub(crate) fn parse_shape(
    shape: FeedShape,
    source: &str,
    doc: &Value,
    options: &NormalizeOptions,
) -> Result<ShapeOutput, String> {
    match shape {
        FeedShape::ListOfIds => parse_list_of_ids(source, doc, options),
        FeedShape::NestedItemsArray => parse_nested_items(source, doc, options),
        FeedShape::NestedChildrenArray => parse_nested_children(source, doc, options),
        FeedShape::FlatObjectArray => parse_flat_objects(source, doc, options),
    }
}

/// Guesses the shape of an untagged payload from its envelope
pub(crate) fn detect_shape(doc: &Value) -> Option<FeedShape> {
    match doc {
        Value::Array(entries) => match entries.first() {
            Some(Value::Number(_)) => Some(FeedShape::ListOfIds),
            Some(Value::Object(_)) => Some(FeedShape::FlatObjectArray),
            // Nothing to tell the array shapes apart; both yield zero items
            None => Some(FeedShape::FlatObjectArray),
            Some(_) => None,
        },
        Value::Object(obj) => {
            if matches!(obj.get("items"), Some(Value::Array(_))) {
                Some(FeedShape::NestedItemsArray)
            } else if children_of(obj).is_some() {
                Some(FeedShape::NestedChildrenArray)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn expect_array<'a>(doc: &'a Value, shape: FeedShape) -> Result<&'a Vec<Value>, String> {
    doc.as_array().ok_or_else(|| {
        format!(
            "expected a top-level array for shape '{}', got {}",
            shape,
            type_name(doc)
        )
    })
}

fn children_of(obj: &Map<String, Value>) -> Option<&Vec<Value>> {
    obj.get("data")?.as_object()?.get("children")?.as_array()
}

fn raw_snapshot(value: &Value, options: &NormalizeOptions) -> Option<String> {
    if options.keep_raw {
        serde_json::to_string(value).ok()
    } else {
        None
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

// ===== list-of-ids =====

fn parse_list_of_ids(
    source: &str,
    doc: &Value,
    options: &NormalizeOptions,
) -> Result<ShapeOutput, String> {
    let entries = expect_array(doc, FeedShape::ListOfIds)?;
    let mut out = ShapeOutput {
        entries: entries.len(),
        ..Default::default()
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(id) = parse_id(entry) else {
            out.skip(
                index,
                format!("expected a non-negative integer id, got {}", type_name(entry)),
            );
            continue;
        };

        let item = NormalizedItem::new(
            source,
            format!("HN Story {}", id),
            format!("https://news.ycombinator.com/item?id={}", id),
        )
        .with_raw_payload(raw_snapshot(entry, options));
        out.items.push(item);
    }

    Ok(out)
}

// ===== nested-items-array =====

fn parse_nested_items(
    source: &str,
    doc: &Value,
    options: &NormalizeOptions,
) -> Result<ShapeOutput, String> {
    let entries = doc
        .as_object()
        .and_then(|obj| obj.get("items"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            format!(
                "expected an object with an 'items' array for shape '{}'",
                FeedShape::NestedItemsArray
            )
        })?;
    let mut out = ShapeOutput {
        entries: entries.len(),
        ..Default::default()
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            out.skip(index, format!("expected object, got {}", type_name(entry)));
            continue;
        };
        let Some(title) = first_string_field(obj, &["full_name", "name"]) else {
            out.skip(index, "missing required field 'full_name'");
            continue;
        };
        let Some(url) = string_field(obj, "html_url") else {
            out.skip(index, "missing required field 'html_url'");
            continue;
        };

        let item = NormalizedItem::new(source, title, url)
            .with_timestamp(obj.get("updated_at").and_then(normalize_timestamp))
            .with_tags(string_list(obj.get("topics")))
            .with_raw_payload(raw_snapshot(entry, options));
        out.items.push(item);
    }

    Ok(out)
}

// ===== nested-children-array =====

fn parse_nested_children(
    source: &str,
    doc: &Value,
    options: &NormalizeOptions,
) -> Result<ShapeOutput, String> {
    let entries = doc.as_object().and_then(children_of).ok_or_else(|| {
        format!(
            "expected an object with a 'data.children' array for shape '{}'",
            FeedShape::NestedChildrenArray
        )
    })?;
    let mut out = ShapeOutput {
        entries: entries.len(),
        ..Default::default()
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(data) = entry
            .as_object()
            .and_then(|child| child.get("data"))
            .and_then(Value::as_object)
        else {
            out.skip(index, "missing 'data' object");
            continue;
        };
        let Some(title) = string_field(data, "title") else {
            out.skip(index, "missing required field 'title'");
            continue;
        };
        let Some(url) = string_field(data, "url") else {
            out.skip(index, "missing required field 'url'");
            continue;
        };

        // A single flair label becomes a one-element tag list
        let tags = string_field(data, "link_flair_text")
            .map(|flair| vec![flair])
            .unwrap_or_default();

        let item = NormalizedItem::new(source, title, url)
            .with_timestamp(data.get("created_utc").and_then(normalize_timestamp))
            .with_tags(tags)
            .with_raw_payload(raw_snapshot(entry, options));
        out.items.push(item);
    }

    Ok(out)
}

// ===== flat-object-array =====

fn parse_flat_objects(
    source: &str,
    doc: &Value,
    options: &NormalizeOptions,
) -> Result<ShapeOutput, String> {
    let entries = expect_array(doc, FeedShape::FlatObjectArray)?;
    let mut out = ShapeOutput {
        entries: entries.len(),
        ..Default::default()
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            out.skip(index, format!("expected object, got {}", type_name(entry)));
            continue;
        };
        let Some(title) = string_field(obj, "title") else {
            out.skip(index, "missing required field 'title'");
            continue;
        };
        let Some(url) = first_string_field(obj, &["url", "comments_url"]) else {
            out.skip(index, "missing required field 'url'");
            continue;
        };

        let item = NormalizedItem::new(source, title, url)
            .with_timestamp(obj.get("created_at").and_then(normalize_timestamp))
            .with_tags(string_list(obj.get("tags")))
            .with_raw_payload(raw_snapshot(entry, options));
        out.items.push(item);
    }

    Ok(out)
}
