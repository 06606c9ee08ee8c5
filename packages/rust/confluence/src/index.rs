//! Requirements index parsing.
//!
//! The index is the JSON document served by the requirements endpoint (or an
//! exported copy on disk):
//!
//! ```json
//! { "requirements": [ { "key": "ACT-006", "htmlExcerpt": "<p>…</p>",
//!     "origin": { "title": "Actors" }, "destinationUrl": "…",
//!     "status": "ACTIVE", "spaceKey": "BJS",
//!     "properties": [ { "key": "@ActorNameEn", "value": "<p>Expert</p>",
//!         "dataType": "TEXT", "indexation": { "text": "Expert" } } ] } ] }
//! ```

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use wikireq_markup::markup_to_inline_text;
use wikireq_shared::{RequirementIndex, RequirementRecord, RequirementStatus, Result, WikiReqError};

/// Counters collected while building an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Entries present in the `requirements` array.
    pub entries: usize,
    /// Records that made it into the index.
    pub loaded: usize,
    /// Entries dropped because their key was already indexed.
    pub duplicates: usize,
    /// Entries dropped because they were not objects or had no key.
    pub skipped: usize,
}

/// Parse an index document. The first occurrence of a key wins.
///
/// Fails with [`WikiReqError::MalformedInput`] only when the text is not a
/// JSON object; individual bad entries are skipped.
#[instrument(skip_all, fields(len = json.len()))]
pub fn parse_index(json: &str, fallback_space: &str) -> Result<(RequirementIndex, IndexStats)> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| WikiReqError::malformed(format!("requirements index is not valid JSON: {e}")))?;

    let Value::Object(root) = root else {
        return Err(WikiReqError::malformed("requirements index must be a JSON object"));
    };

    let mut index = RequirementIndex::new();
    let mut stats = IndexStats::default();

    let Some(entries) = root.get("requirements").and_then(Value::as_array) else {
        warn!("requirements index has no `requirements` array");
        return Ok((index, stats));
    };

    stats.entries = entries.len();

    for (position, entry) in entries.iter().enumerate() {
        let Some(record) = entry.as_object().and_then(|e| parse_record(e, fallback_space)) else {
            debug!(position, "skipping malformed index entry");
            stats.skipped += 1;
            continue;
        };

        let key = record.key.clone();
        if index.insert(record) {
            stats.loaded += 1;
        } else {
            debug!(%key, position, "duplicate key, keeping first occurrence");
            stats.duplicates += 1;
        }
    }

    info!(
        entries = stats.entries,
        loaded = stats.loaded,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        "requirements index parsed"
    );

    Ok((index, stats))
}

/// Read and parse an index file. An unreadable file is reported as
/// [`WikiReqError::SourceUnavailable`], like an unreachable endpoint.
pub fn load_index_file(path: &Path, fallback_space: &str) -> Result<(RequirementIndex, IndexStats)> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| WikiReqError::unavailable(path.display().to_string(), e.to_string()))?;
    parse_index(&json, fallback_space)
}

fn parse_record(entry: &Map<String, Value>, fallback_space: &str) -> Option<RequirementRecord> {
    let key = string_field(entry, "key")?.trim().to_string();
    if key.is_empty() {
        return None;
    }

    let mut record = RequirementRecord::new(key);
    record.origin_title = entry
        .get("origin")
        .and_then(Value::as_object)
        .and_then(|origin| string_field(origin, "title"))
        .unwrap_or_default();
    record.destination_url = string_field(entry, "destinationUrl").unwrap_or_default();
    record.status = string_field(entry, "status")
        .map(RequirementStatus::from)
        .unwrap_or_default();
    record.space_key =
        string_field(entry, "spaceKey").unwrap_or_else(|| fallback_space.to_string());

    let mut excerpt_lines = Vec::new();
    let properties = entry.get("properties").and_then(Value::as_array);

    for prop in properties.into_iter().flatten().filter_map(Value::as_object) {
        let Some(prop_key) = string_field(prop, "key").filter(|k| !k.trim().is_empty()) else {
            continue;
        };

        if let Some(value) = string_field(prop, "value") {
            let clean = markup_to_inline_text(&value);
            if !clean.is_empty() {
                record.properties.insert(prop_key.clone(), clean);
            }
        }

        if let Some(indexation) = prop.get("indexation").and_then(Value::as_object) {
            push_indexation(&prop_key, indexation, &mut excerpt_lines);
        }
    }

    record.excerpt = if excerpt_lines.is_empty() {
        string_field(entry, "htmlExcerpt")
            .map(|html| markup_to_inline_text(&html))
            .unwrap_or_default()
    } else {
        excerpt_lines.join("\n")
    };

    Some(record)
}

/// Render a property's indexed values as excerpt lines.
///
/// Multi-valued properties become `KEY:` followed by one bullet per value;
/// single text values become `KEY: value`.
fn push_indexation(prop_key: &str, indexation: &Map<String, Value>, lines: &mut Vec<String>) {
    let values: Vec<String> = indexation
        .get("multivalues")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(scalar_to_string)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    if !values.is_empty() {
        lines.push(format!("{prop_key}:"));
        lines.extend(values.iter().map(|v| format!("  • {v}")));
    }

    if let Some(text) = string_field(indexation, "text") {
        let text = text.trim();
        if !text.is_empty() {
            lines.push(format!("{prop_key}: {text}"));
        }
    }
}

/// A string, number or boolean field rendered as text.
fn string_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    obj.get(name).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
