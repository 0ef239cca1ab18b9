//! # Effective Configuration
//!
//! Typed configuration for one site after `_defaults` and the site block
//! have been merged and validated.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization (camelCase JSON keys)
//! - Use `validator` for range checks on the typed values

use crate::error::ConfigError;
use crate::site::normalize_content_folder_ids;
use crate::transform_spec::TransformChain;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

pub const DEFAULT_ARTICLE_TYPE: &str = "Knowledge__kav";
pub const DEFAULT_FOLDER_ID: &str = "root";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_LANGUAGE: &str = "en_US";
pub const DEFAULT_EXTERNAL_ID_FIELD: &str = "External_Id__c";

/// Resolved configuration for a single site.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Drives one sync run: which article type to write, how source fields map to
/// article fields, how many records go in a batch and whether drafts are
/// published.
///
/// ## Fields
/// - `article_type`: target article object (default: "Knowledge__kav")
/// - `field_mapping`: ordered target field -> dotted source path
/// - `transforms`: target field -> ordered transform chain
/// - `static_fields`: target field -> literal, applied last
/// - `field_metadata`: target field -> type descriptor for field provisioning
/// - `content_folder_ids`: folders to export (default: ["root"])
/// - `batch_size`: records per batch, 1-500 (default: 50)
/// - `export_mode`: delta or full (default: delta)
/// - `publish_articles`: publish drafts after writing (default: false)
/// - `record_type_name`: record type developer name, set on create
/// - `data_category`: single data category selection, `Group:Category`
/// - `auto_create_fields`: create missing custom fields before the run
/// - `enable_debug_logging`: raise log verbosity for this site
/// - `language`: article language, create only (default: "en_US")
/// - `external_id_field`: field holding the source record id
/// - `recursive_folders`: include records of sub-folders (default: true)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    #[serde(default = "default_article_type")]
    #[validate(length(min = 1))]
    pub article_type: String,

    #[serde(default)]
    pub field_mapping: FieldMapping,

    #[serde(default)]
    pub transforms: BTreeMap<String, TransformChain>,

    #[serde(default, rename = "static")]
    pub static_fields: Map<String, Value>,

    #[serde(default)]
    pub field_metadata: BTreeMap<String, Value>,

    #[serde(
        default = "default_folder_ids",
        rename = "contentFolderIDs",
        deserialize_with = "deserialize_folder_ids"
    )]
    #[validate(length(min = 1))]
    pub content_folder_ids: Vec<String>,

    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 500))]
    pub batch_size: u32,

    #[serde(default)]
    pub export_mode: ExportMode,

    #[serde(default)]
    pub publish_articles: bool,

    #[serde(default)]
    pub record_type_name: Option<String>,

    #[serde(default)]
    pub data_category: Option<String>,

    #[serde(default)]
    pub auto_create_fields: bool,

    #[serde(default)]
    pub enable_debug_logging: bool,

    #[serde(default = "default_language")]
    #[validate(length(min = 1))]
    pub language: String,

    #[serde(default = "default_external_id_field")]
    #[validate(length(min = 1))]
    pub external_id_field: String,

    #[serde(default = "default_recursive_folders")]
    pub recursive_folders: bool,
}

/// Delta exports only changed records, full exports everything online.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Delta,
    Full,
}

impl std::str::FromStr for ExportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delta" => Ok(Self::Delta),
            "full" => Ok(Self::Full),
            other => Err(ConfigError::InvalidExportMode(other.to_string())),
        }
    }
}

/// Ordered `target field -> source path` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping(Vec<(String, String)>);

impl FieldMapping {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(t, s)| (t.as_str(), s.as_str()))
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(t, _)| t.as_str())
    }

    pub fn source_path(&self, target: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, s)| s.as_str())
    }

    /// Removes a target field, returning whether it was mapped.
    pub fn remove(&mut self, target: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|(t, _)| t != target);
        before != self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
        )
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(t, s)| (t.clone(), Value::String(s.clone())))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(target, path)| match path {
                Value::String(path) => Ok((target, path)),
                other => Err(serde::de::Error::custom(format!(
                    "fieldMapping.{target} must be a string, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl EffectiveConfig {
    /// Builds the typed configuration from a merged map that already passed
    /// [`validate`](crate::validation::validate).
    pub fn from_resolved(resolved: Map<String, Value>) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(Value::Object(resolved))?;
        config.validate()?;
        Ok(config)
    }

    /// Every article field this configuration may write, in mapping order
    /// followed by static fields.
    pub fn target_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.field_mapping.targets().map(str::to_string).collect();
        for name in self.static_fields.keys() {
            if !fields.contains(name) {
                fields.push(name.clone());
            }
        }
        fields
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            article_type: default_article_type(),
            field_mapping: FieldMapping::default(),
            transforms: BTreeMap::new(),
            static_fields: Map::new(),
            field_metadata: BTreeMap::new(),
            content_folder_ids: default_folder_ids(),
            batch_size: DEFAULT_BATCH_SIZE,
            export_mode: ExportMode::Delta,
            publish_articles: false,
            record_type_name: None,
            data_category: None,
            auto_create_fields: false,
            enable_debug_logging: false,
            language: default_language(),
            external_id_field: default_external_id_field(),
            recursive_folders: default_recursive_folders(),
        }
    }
}

fn default_article_type() -> String {
    DEFAULT_ARTICLE_TYPE.to_string()
}

fn default_folder_ids() -> Vec<String> {
    vec![DEFAULT_FOLDER_ID.to_string()]
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_external_id_field() -> String {
    DEFAULT_EXTERNAL_ID_FIELD.to_string()
}

fn default_recursive_folders() -> bool {
    true
}

fn deserialize_folder_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(normalize_content_folder_ids(raw.as_ref()))
}
