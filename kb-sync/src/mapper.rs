//! Projection of source records onto article fields.

use crate::types::SourceRecord;
use config::FieldMapping;
use serde_json::{Map, Value, json};
use tracing::debug;

pub const LANGUAGE_FIELD: &str = "Language";
pub const DATA_CATEGORY_FIELD: &str = "DataCategorySelections";

/// Keys of rich-text objects whose string payload replaces the object.
const MARKUP_KEYS: &[&str] = &["markup", "source"];

/// Inputs for one mapping pass.
#[derive(Debug, Clone, Copy)]
pub struct MappingRequest<'a> {
    pub target_type: &'a str,
    pub field_mapping: &'a FieldMapping,
    pub data_category: Option<&'a str>,
    pub is_create: bool,
    pub language: &'a str,
    pub debug: bool
}

/// Maps a source record into an article payload.
///
/// Only fields whose safe value is non-null and non-empty are included. The
/// language field is only sent when creating, because the remote rejects
/// updates to it.
pub fn map_record(source: &SourceRecord, request: &MappingRequest<'_>) -> Map<String, Value> {
    let document = source.to_document();
    let mut payload = Map::new();

    for (target, path) in request.field_mapping.iter() {
        let raw = resolve_path(&document, path);
        match safe_value(raw) {
            Some(value) => {
                if request.debug {
                    debug!(content_id = %source.id, target, path, "Mapped field");
                }
                payload.insert(target.to_string(), value);
            }
            None => {
                if request.debug {
                    debug!(content_id = %source.id, target, path, "Source value empty, field omitted");
                }
            }
        }
    }

    if request.is_create && !request.language.is_empty() {
        payload.insert(
            LANGUAGE_FIELD.to_string(),
            Value::String(request.language.to_string())
        );
    }

    if let Some(category) = request.data_category.filter(|c| !c.is_empty()) {
        payload.insert(DATA_CATEGORY_FIELD.to_string(), category_selection(category));
    }

    if request.debug {
        debug!(
            content_id = %source.id,
            target_type = request.target_type,
            fields = payload.len(),
            "Mapped record"
        );
    }

    payload
}

/// Walks a dotted path. A missing segment yields `None`; numeric segments
/// index into arrays.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None
        })
}

/// Converts a raw value into something safe to send, or `None` when the
/// field should be omitted.
pub fn safe_value(raw: Option<&Value>) -> Option<Value> {
    let value = match raw? {
        Value::Null => return None,
        Value::Object(map) => match markup_payload(map) {
            Some(markup) => Value::String(markup.to_string()),
            None => Value::String(Value::Object(map.clone()).to_string())
        },
        Value::Array(items) => Value::String(Value::Array(items.clone()).to_string()),
        primitive => primitive.clone()
    };

    match &value {
        Value::String(s) if s.is_empty() => None,
        _ => Some(value)
    }
}

fn markup_payload(map: &Map<String, Value>) -> Option<&str> {
    MARKUP_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
}

/// Single data category selection. `Group:Category` names both parts,
/// a bare value names only the category.
fn category_selection(category: &str) -> Value {
    let selection = match category.split_once(':') {
        Some((group, name)) => json!({
            "DataCategoryGroupName": group.trim(),
            "DataCategoryName": name.trim()
        }),
        None => json!({ "DataCategoryName": category.trim() })
    };
    json!({ "records": [selection] })
}
