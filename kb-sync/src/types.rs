use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A content item exported from the commerce content repository.
///
/// Unknown top-level attributes (descriptive text fields such as
/// `description` or `body`) are kept in `attributes`; site-specific custom
/// attributes live under `custom`. The three `sync_*`/`last_sync_time`
/// fields are owned by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_online")]
    pub online: bool,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub custom: Map<String, Value>,
    #[serde(default)]
    pub sync_article_id: Option<String>,
    #[serde(default)]
    pub sync_version_id: Option<String>,
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>
}

fn default_online() -> bool {
    true
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: None,
            online: true,
            last_modified,
            folders: Vec::new(),
            custom: Map::new(),
            sync_article_id: None,
            sync_version_id: None,
            last_sync_time: None,
            attributes: Map::new()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// JSON view of the record used for dotted-path lookups.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Applies the bookkeeping written after a successful sync.
    pub fn mark_synced(&mut self, metadata: &SyncMetadata) {
        self.sync_article_id = Some(metadata.master_id.clone());
        self.sync_version_id = Some(metadata.version_id.clone());
        self.last_sync_time = Some(metadata.synced_at);
    }
}

/// Sync-tracking values persisted on a source record after a successful
/// remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub content_id: String,
    pub master_id: String,
    pub version_id: String,
    pub synced_at: DateTime<Utc>
}

/// Lifecycle state of one article version on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PublishStatus {
    Draft,
    Online,
    Archived,
    Other(String)
}

impl PublishStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "Draft",
            Self::Online => "Online",
            Self::Archived => "Archived",
            Self::Other(status) => status
        }
    }
}

impl From<&str> for PublishStatus {
    fn from(status: &str) -> Self {
        match status {
            "Draft" => Self::Draft,
            "Online" => Self::Online,
            "Archived" => Self::Archived,
            other => Self::Other(other.to_string())
        }
    }
}

impl From<String> for PublishStatus {
    fn from(status: String) -> Self {
        Self::from(status.as_str())
    }
}

impl From<PublishStatus> for String {
    fn from(status: PublishStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One version row of a knowledge article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleVersion {
    pub version_id: String,
    pub master_id: String,
    pub publish_status: PublishStatus,
    pub external_id: Option<String>,
    pub version_number: u32
}

impl ArticleVersion {
    /// Builds a version from a query row selecting `Id`,
    /// `KnowledgeArticleId`, `PublishStatus`, `VersionNumber` and the
    /// external id field.
    pub fn from_row(row: &Value, external_id_field: &str) -> Option<Self> {
        Some(Self {
            version_id: row.get("Id")?.as_str()?.to_string(),
            master_id: row.get("KnowledgeArticleId")?.as_str()?.to_string(),
            publish_status: row
                .get("PublishStatus")
                .and_then(Value::as_str)
                .map(PublishStatus::from)
                .unwrap_or_else(|| PublishStatus::Other(String::new())),
            external_id: row
                .get(external_id_field)
                .and_then(Value::as_str)
                .map(str::to_string),
            version_number: row
                .get("VersionNumber")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32
        })
    }
}

/// Write performed for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    EditOnline
}

/// Publication state reported for a synced record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Draft,
    Online
}

/// Outcome of one record's upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub content_id: String,
    pub success: bool,
    pub master_id: Option<String>,
    pub version_id: Option<String>,
    pub operation: Option<SyncOperation>,
    pub publish_status: Option<PublicationState>,
    pub error: Option<String>,
    pub warning: Option<String>
}

impl SyncResult {
    pub fn succeeded(
        content_id: impl Into<String>,
        master_id: impl Into<String>,
        version_id: impl Into<String>,
        operation: SyncOperation
    ) -> Self {
        Self {
            content_id: content_id.into(),
            success: true,
            master_id: Some(master_id.into()),
            version_id: Some(version_id.into()),
            operation: Some(operation),
            publish_status: Some(PublicationState::Draft),
            error: None,
            warning: None
        }
    }

    pub fn failed(content_id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            content_id: content_id.into(),
            success: false,
            master_id: None,
            version_id: None,
            operation: None,
            publish_status: None,
            error: Some(error.to_string()),
            warning: None
        }
    }

    /// Appends a warning, keeping earlier ones.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        self.warning = Some(match self.warning.take() {
            Some(existing) => format!("{existing}; {warning}"),
            None => warning
        });
    }

    /// Metadata to persist for a successful result.
    pub fn metadata(&self, synced_at: DateTime<Utc>) -> Option<SyncMetadata> {
        if !self.success {
            return None;
        }
        Some(SyncMetadata {
            content_id: self.content_id.clone(),
            master_id: self.master_id.clone()?,
            version_id: self.version_id.clone()?,
            synced_at
        })
    }
}
