//! # Site Configuration Sets
//!
//! A configuration document holds one `_defaults` block and one block per
//! site (tenant). [`SiteConfigSet`] parses that document and resolves the
//! effective configuration for a single site.

use crate::config::EffectiveConfig;
use crate::error::ConfigError;
use crate::precedence::{STATIC_KEY, merge_site_config};
use crate::validation::{ValidationReport, validate};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Reserved key holding configuration shared by all sites.
pub const DEFAULTS_KEY: &str = "_defaults";

/// Legacy spelling of the static block accepted on input.
const STATIC_ALIAS: &str = "staticFields";

/// Parsed multi-site configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfigSet {
    blocks: Map<String, Value>,
}

impl SiteConfigSet {
    /// Strict JSON parse. Returns `None` for empty input, invalid JSON or a
    /// document that is not a JSON object.
    pub fn parse(json: &str) -> Option<Self> {
        if json.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(blocks)) => Some(Self::from_blocks(blocks)),
            Ok(other) => {
                warn!(kind = ?other, "Site configuration is not a JSON object");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse site configuration");
                None
            }
        }
    }

    pub fn from_blocks(mut blocks: Map<String, Value>) -> Self {
        for block in blocks.values_mut() {
            if let Value::Object(entries) = block {
                if let Some(statics) = entries.remove(STATIC_ALIAS) {
                    entries.entry(STATIC_KEY).or_insert(statics);
                }
            }
        }
        Self { blocks }
    }

    /// The `_defaults` block, or an empty object when absent or malformed.
    pub fn defaults(&self) -> Map<String, Value> {
        match self.blocks.get(DEFAULTS_KEY) {
            Some(Value::Object(defaults)) => defaults.clone(),
            Some(_) => {
                warn!("`{}` is not an object, ignoring it", DEFAULTS_KEY);
                Map::new()
            }
            None => Map::new(),
        }
    }

    /// Identifiers of every site block in document order.
    pub fn site_ids(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .keys()
            .map(String::as_str)
            .filter(|key| *key != DEFAULTS_KEY)
    }

    pub fn has_site(&self, site_id: &str) -> bool {
        site_id != DEFAULTS_KEY && self.blocks.contains_key(site_id)
    }

    /// Merges the site block over the defaults. Without a site block the
    /// defaults alone are returned.
    pub fn resolve(&self, site_id: &str) -> Map<String, Value> {
        let defaults = self.defaults();

        match self.blocks.get(site_id) {
            Some(Value::Object(site)) if site_id != DEFAULTS_KEY => {
                merge_site_config(&defaults, site)
            }
            Some(_) if site_id != DEFAULTS_KEY => {
                warn!(site_id, "Site block is not an object, using defaults only");
                defaults
            }
            _ => {
                debug!(site_id, "No site block found, using defaults only");
                defaults
            }
        }
    }

    /// Resolves and validates without building the typed configuration.
    pub fn check(&self, site_id: &str) -> ValidationReport {
        validate(&self.resolve(site_id))
    }

    /// Resolves, validates and builds the effective configuration for a site.
    pub fn effective(&self, site_id: &str) -> Result<EffectiveConfig, ConfigError> {
        let resolved = self.resolve(site_id);
        let report = validate(&resolved);

        for warning in &report.warnings {
            warn!(site_id, "{}", warning);
        }

        if !report.valid {
            return Err(ConfigError::Invalid {
                site: site_id.to_string(),
                errors: report.errors,
            });
        }

        EffectiveConfig::from_resolved(resolved)
    }
}

/// Normalizes the `contentFolderIDs` setting.
///
/// - array input is passed through (string entries only)
/// - a comma-separated string is split, trimmed and empty segments dropped
/// - any other non-empty string becomes a one-element list
/// - absent or falsy input defaults to `["root"]`
pub fn normalize_content_folder_ids(value: Option<&Value>) -> Vec<String> {
    let ids = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(raw)) if raw.contains(',') => raw
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(raw)) if !raw.is_empty() => vec![raw.clone()],
        _ => Vec::new(),
    };

    if ids.is_empty() {
        return vec![crate::config::DEFAULT_FOLDER_ID.to_string()];
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportMode;
    use serde_json::json;

    const DOC: &str = r#"{
        "_defaults": {
            "articleType": "Knowledge__kav",
            "fieldMapping": {"Title": "name", "UrlName": "name"},
            "transforms": {"UrlName": "urlSafe:-"},
            "static": {"Source__c": "catalog"},
            "batchSize": 50,
            "exportMode": "delta"
        },
        "SiteGenesis": {
            "batchSize": 25,
            "static": {"Brand__c": "genesis"}
        },
        "RefArch": {
            "fieldMapping": {"Title": "custom.headline"},
            "exportMode": "full"
        }
    }"#;

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(SiteConfigSet::parse("").is_none());
        assert!(SiteConfigSet::parse("   ").is_none());
        assert!(SiteConfigSet::parse("null").is_none());
        assert!(SiteConfigSet::parse("[1,2]").is_none());
        assert!(SiteConfigSet::parse("{not json").is_none());
        assert!(SiteConfigSet::parse("{}").is_some());
    }

    #[test]
    fn test_site_ids_skip_defaults() {
        let set = SiteConfigSet::parse(DOC).unwrap();
        let ids: Vec<&str> = set.site_ids().collect();
        assert_eq!(ids, vec!["SiteGenesis", "RefArch"]);
        assert!(set.has_site("RefArch"));
        assert!(!set.has_site(DEFAULTS_KEY));
    }

    #[test]
    fn test_resolve_unknown_site_uses_defaults() {
        let set = SiteConfigSet::parse(DOC).unwrap();
        assert_eq!(set.resolve("Unknown"), set.defaults());
    }

    #[test]
    fn test_resolve_missing_defaults() {
        let set = SiteConfigSet::parse(r#"{"A": {"batchSize": 5}}"#).unwrap();
        assert_eq!(set.resolve("A"), json!({"batchSize": 5}).as_object().cloned().unwrap());
        assert!(set.resolve("B").is_empty());
    }

    #[test]
    fn test_effective_merges_static_and_overrides() {
        let set = SiteConfigSet::parse(DOC).unwrap();

        let genesis = set.effective("SiteGenesis").unwrap();
        assert_eq!(genesis.batch_size, 25);
        assert_eq!(genesis.static_fields["Source__c"], json!("catalog"));
        assert_eq!(genesis.static_fields["Brand__c"], json!("genesis"));
        assert_eq!(genesis.field_mapping.len(), 2);

        let ref_arch = set.effective("RefArch").unwrap();
        assert_eq!(ref_arch.export_mode, ExportMode::Full);
        assert_eq!(ref_arch.field_mapping.len(), 1);
        assert_eq!(ref_arch.field_mapping.source_path("Title"), Some("custom.headline"));
    }

    #[test]
    fn test_effective_fails_fast_on_invalid() {
        let set = SiteConfigSet::parse(r#"{"_defaults": {"batchSize": 900}}"#).unwrap();
        let err = set.effective("any").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("batchSize"));
    }

    #[test]
    fn test_static_fields_alias_is_normalized() {
        let set = SiteConfigSet::parse(
            r#"{"_defaults": {"staticFields": {"A__c": "1"}}, "S": {"static": {"B__c": "2"}}}"#,
        )
        .unwrap();
        let resolved = set.resolve("S");
        assert_eq!(resolved["static"], json!({"A__c": "1", "B__c": "2"}));
    }

    #[test]
    fn test_normalize_content_folder_ids() {
        assert_eq!(normalize_content_folder_ids(None), vec!["root"]);
        assert_eq!(normalize_content_folder_ids(Some(&json!(""))), vec!["root"]);
        assert_eq!(normalize_content_folder_ids(Some(&json!(null))), vec!["root"]);
        assert_eq!(normalize_content_folder_ids(Some(&json!(false))), vec!["root"]);
        assert_eq!(normalize_content_folder_ids(Some(&json!("faq"))), vec!["faq"]);
        assert_eq!(
            normalize_content_folder_ids(Some(&json!(" faq, ,help ,"))),
            vec!["faq", "help"]
        );
        assert_eq!(
            normalize_content_folder_ids(Some(&json!(["a", "b"]))),
            vec!["a", "b"]
        );
    }
}
