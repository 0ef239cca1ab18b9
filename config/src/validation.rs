//! # Configuration Validation
//!
//! Shape and range checks over a resolved (merged) site configuration map.
//! Validation runs on the raw JSON map so type mismatches can be reported
//! per key instead of failing on the first deserialization error. The typed
//! [`EffectiveConfig`](crate::EffectiveConfig) additionally carries
//! `validator` derive rules that are checked once it is built.

use crate::precedence::STATIC_KEY;
use crate::transform_spec::{TransformChain, json_kind};
use serde::Serialize;
use serde_json::{Map, Value};

pub const MIN_BATCH_SIZE: u64 = 1;
pub const MAX_BATCH_SIZE: u64 = 500;

const KNOWN_KEYS: &[&str] = &[
    "articleType",
    "fieldMapping",
    "transforms",
    STATIC_KEY,
    "fieldMetadata",
    "contentFolderIDs",
    "batchSize",
    "exportMode",
    "publishArticles",
    "recordTypeName",
    "dataCategory",
    "autoCreateFields",
    "enableDebugLogging",
    "language",
    "externalIdField",
    "recursiveFolders",
];

/// Outcome of validating a resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate a resolved site configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Reports every problem in a merged configuration at once. Errors make the
/// configuration unusable; warnings are logged and the run proceeds.
///
/// ## Validation Rules
/// ### Types
/// - `articleType`, `recordTypeName`, `dataCategory`: strings if present
/// - `language`, `externalIdField`: non-empty strings if present
/// - `articleType`, `externalIdField`: API names usable in a query
/// - `publishArticles`, `enableDebugLogging`, `autoCreateFields`,
///   `recursiveFolders`: booleans if present
/// - `fieldMapping`, `fieldMetadata`, `static`: objects if present
///
/// ### Ranges
/// - `batchSize`: integer in 1-500
/// - `exportMode`: "delta" or "full"
/// - `contentFolderIDs`: non-empty string, or non-empty array of non-empty
///   strings
///
/// ### Transforms
/// - each value must be a string, an object, or a list of those
/// - malformed objects are errors, unknown transform names are warnings
///
/// ### Warnings
/// - empty `fieldMapping`
/// - a field targeted by both `transforms` and `static` (static wins)
/// - unrecognized top-level keys
pub fn validate(config: &Map<String, Value>) -> ValidationReport {
    let mut report = ValidationReport::default();

    for key in ["articleType", "recordTypeName", "dataCategory"] {
        expect_string(config, key, false, &mut report);
    }
    for key in ["language", "externalIdField"] {
        expect_string(config, key, true, &mut report);
    }
    for key in ["articleType", "externalIdField"] {
        if let Some(Value::String(name)) = config.get(key) {
            if !name.is_empty() && !is_api_name(name) {
                report.error(format!(
                    "{key} must be an API name of letters, digits and underscores, got {name:?}"
                ));
            }
        }
    }
    for key in [
        "publishArticles",
        "enableDebugLogging",
        "autoCreateFields",
        "recursiveFolders",
    ] {
        if let Some(value) = config.get(key) {
            if !value.is_boolean() {
                report.error(format!("{key} must be a boolean, got {}", json_kind(value)));
            }
        }
    }

    validate_batch_size(config, &mut report);
    validate_export_mode(config, &mut report);
    validate_folder_ids(config, &mut report);
    validate_objects(config, &mut report);
    validate_transforms(config, &mut report);

    for key in config.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            report.warning(format!("Unknown configuration key: {key}"));
        }
    }

    report.valid = report.errors.is_empty();
    report
}

/// Object and field names are interpolated into queries unquoted.
fn is_api_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn expect_string(
    config: &Map<String, Value>,
    key: &str,
    non_empty: bool,
    report: &mut ValidationReport,
) {
    match config.get(key) {
        None => {}
        Some(Value::String(s)) if non_empty && s.trim().is_empty() => {
            report.error(format!("{key} must not be empty"));
        }
        Some(Value::String(_)) => {}
        Some(other) => report.error(format!("{key} must be a string, got {}", json_kind(other))),
    }
}

fn validate_batch_size(config: &Map<String, Value>, report: &mut ValidationReport) {
    let Some(value) = config.get("batchSize") else {
        return;
    };

    match value.as_u64() {
        Some(size) if (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&size) => {}
        Some(size) => report.error(format!(
            "batchSize must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {size}"
        )),
        None => report.error(format!(
            "batchSize must be an integer between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {value}"
        )),
    }
}

fn validate_export_mode(config: &Map<String, Value>, report: &mut ValidationReport) {
    match config.get("exportMode") {
        None => {}
        Some(Value::String(mode)) if mode == "delta" || mode == "full" => {}
        Some(other) => report.error(format!(
            "exportMode must be \"delta\" or \"full\", got {other}"
        )),
    }
}

fn validate_folder_ids(config: &Map<String, Value>, report: &mut ValidationReport) {
    match config.get("contentFolderIDs") {
        None => {}
        Some(Value::String(ids)) if !ids.trim().is_empty() => {}
        Some(Value::Array(ids)) if !ids.is_empty() => {
            for (index, id) in ids.iter().enumerate() {
                match id.as_str() {
                    Some(s) if !s.trim().is_empty() => {}
                    _ => report.error(format!(
                        "contentFolderIDs[{index}] must be a non-empty string"
                    )),
                }
            }
        }
        Some(_) => report.error(
            "contentFolderIDs must be a non-empty string or a non-empty array of strings",
        ),
    }
}

fn validate_objects(config: &Map<String, Value>, report: &mut ValidationReport) {
    for key in ["fieldMapping", "fieldMetadata", STATIC_KEY] {
        if let Some(value) = config.get(key) {
            if !value.is_object() {
                report.error(format!("{key} must be an object, got {}", json_kind(value)));
            }
        }
    }

    if let Some(Value::Object(mapping)) = config.get("fieldMapping") {
        if mapping.is_empty() {
            report.warning("fieldMapping is empty, only static fields will be sent");
        }
        for (target, path) in mapping {
            match path.as_str() {
                Some(p) if !p.trim().is_empty() => {}
                _ => report.error(format!(
                    "fieldMapping.{target} must be a non-empty source path string"
                )),
            }
        }
    }
}

fn validate_transforms(config: &Map<String, Value>, report: &mut ValidationReport) {
    let Some(value) = config.get("transforms") else {
        return;
    };
    let Value::Object(transforms) = value else {
        report.error(format!("transforms must be an object, got {}", json_kind(value)));
        return;
    };

    let statics = config.get(STATIC_KEY).and_then(Value::as_object);

    for (field, declaration) in transforms {
        match TransformChain::parse(declaration) {
            Ok(chain) => {
                for spec in chain.specs().iter().filter(|spec| !spec.is_known()) {
                    report.warning(format!(
                        "transforms.{field}: unknown transform \"{}\" will be ignored",
                        spec.name()
                    ));
                }
            }
            Err(e) => report.error(format!("transforms.{field}: {e}")),
        }

        if statics.is_some_and(|s| s.contains_key(field)) {
            report.warning(format!(
                "{field} has both a transform and a static value; the static value wins"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: Value) -> ValidationReport {
        validate(value.as_object().unwrap())
    }

    #[test]
    fn test_validate_empty_config() {
        let report = check(json!({}));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_validate_full_valid_config() {
        let report = check(json!({
            "articleType": "Knowledge__kav",
            "fieldMapping": {"Title": "name"},
            "transforms": {"UrlName": ["lowercase", {"type": "replace", "pattern": "x"}]},
            "static": {"Source__c": "catalog"},
            "fieldMetadata": {"Source__c": {"type": "Text", "length": 80}},
            "contentFolderIDs": ["root", "faq"],
            "batchSize": 500,
            "exportMode": "full",
            "publishArticles": true,
            "recordTypeName": "FAQ",
            "dataCategory": "Topics:Accounts",
            "autoCreateFields": false,
            "enableDebugLogging": true
        }));
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_validate_batch_size_range() {
        assert!(!check(json!({"batchSize": 0})).valid);
        assert!(!check(json!({"batchSize": 501})).valid);
        assert!(!check(json!({"batchSize": 2.5})).valid);
        assert!(!check(json!({"batchSize": "10"})).valid);
        assert!(check(json!({"batchSize": 1})).valid);
    }

    #[test]
    fn test_validate_export_mode() {
        assert!(check(json!({"exportMode": "delta"})).valid);
        assert!(!check(json!({"exportMode": "incremental"})).valid);
    }

    #[test]
    fn test_validate_type_errors() {
        let report = check(json!({
            "articleType": 5,
            "publishArticles": "yes",
            "fieldMapping": [],
            "static": "x"
        }));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 4);
    }

    #[test]
    fn test_validate_content_folder_ids() {
        assert!(check(json!({"contentFolderIDs": "root,faq"})).valid);
        assert!(!check(json!({"contentFolderIDs": ""})).valid);
        assert!(!check(json!({"contentFolderIDs": []})).valid);
        assert!(!check(json!({"contentFolderIDs": ["ok", ""]})).valid);
        assert!(!check(json!({"contentFolderIDs": 3})).valid);
    }

    #[test]
    fn test_empty_field_mapping_is_warning() {
        let report = check(json!({"fieldMapping": {}}));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_transform_is_warning_malformed_is_error() {
        let report = check(json!({"transforms": {"Title": "titleCase"}}));
        assert!(report.valid);
        assert!(report.warnings[0].contains("titleCase"));

        let report = check(json!({"transforms": {"Title": 12}}));
        assert!(!report.valid);

        let report = check(json!({"transforms": {"Title": {"type": "replace"}}}));
        assert!(!report.valid);
    }

    #[test]
    fn test_transform_and_static_collision_warns() {
        let report = check(json!({
            "transforms": {"UrlName": "urlSafe"},
            "static": {"UrlName": "fixed"}
        }));
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("static value wins")));
    }

    #[test]
    fn test_unknown_key_is_warning() {
        let report = check(json!({"batchsize": 10}));
        assert!(report.valid);
        assert!(report.warnings[0].contains("batchsize"));
    }

    #[test]
    fn test_names_used_in_queries_must_be_api_names() {
        assert!(check(json!({"articleType": "FAQ__kav", "externalIdField": "Ext_1__c"})).valid);

        let report = check(json!({"externalIdField": "Id' OR Name != '"}));
        assert!(!report.valid);
        assert!(report.errors[0].contains("externalIdField"));

        assert!(!check(json!({"articleType": "1Knowledge"})).valid);
    }
}
