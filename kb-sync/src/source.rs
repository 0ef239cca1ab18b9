//! Content repository access.

use crate::error::{KbResult, KbSyncError};
use crate::types::{SourceRecord, SyncMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const ROOT_FOLDER: &str = "root";

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Online records assigned to any of `folder_ids` (and their descendants
    /// when `recursive`).
    async fn list_records(&self, folder_ids: &[String], recursive: bool) -> KbResult<Vec<SourceRecord>>;

    async fn persist_sync_metadata(&self, metadata: &SyncMetadata) -> KbResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>
}

/// Content export document: a folder tree and the records in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentExport {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub records: Vec<SourceRecord>
}

impl ContentExport {
    /// `folder_ids` plus, when `recursive`, every folder below them.
    pub fn expand_folders(&self, folder_ids: &[String], recursive: bool) -> BTreeSet<String> {
        let mut selected: BTreeSet<String> = folder_ids.iter().cloned().collect();
        if !recursive {
            return selected;
        }

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for folder in &self.folders {
            let parent = folder.parent.as_deref().unwrap_or(ROOT_FOLDER);
            if parent != folder.id {
                children.entry(parent).or_default().push(&folder.id);
            }
        }

        let mut pending: Vec<String> = selected.iter().cloned().collect();
        while let Some(id) = pending.pop() {
            for child in children.get(id.as_str()).into_iter().flatten() {
                if selected.insert(child.to_string()) {
                    pending.push(child.to_string());
                }
            }
        }
        selected
    }

    /// Online records in `folders`. Records without folders live in the root.
    pub fn records_in(&self, folders: &BTreeSet<String>) -> Vec<SourceRecord> {
        self.records
            .iter()
            .filter(|r| r.online)
            .filter(|r| {
                if r.folders.is_empty() {
                    folders.contains(ROOT_FOLDER)
                } else {
                    r.folders.iter().any(|f| folders.contains(f))
                }
            })
            .cloned()
            .collect()
    }
}

/// Content source backed by a JSON export file. Sync metadata is written
/// back into the same file.
///
/// Every `persist_sync_metadata` call re-reads and rewrites the whole file,
/// so a run costs one full rewrite per synced record. Suited to exports of a
/// few thousand records; larger catalogs want a source with per-record
/// storage.
pub struct JsonFileSource {
    path: PathBuf,
    lock: Mutex<()>
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> KbResult<ContentExport> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            KbSyncError::SourceError(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            KbSyncError::SourceError(format!("invalid content export {}: {}", self.path.display(), e))
        })
    }

    async fn write(&self, export: &ContentExport) -> KbResult<()> {
        let content = serde_json::to_string_pretty(export)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    async fn list_records(&self, folder_ids: &[String], recursive: bool) -> KbResult<Vec<SourceRecord>> {
        let export = self.read().await?;
        let folders = export.expand_folders(folder_ids, recursive);
        let records = export.records_in(&folders);
        info!(
            path = %self.path.display(),
            folders = folders.len(),
            records = records.len(),
            "Loaded content records"
        );
        Ok(records)
    }

    async fn persist_sync_metadata(&self, metadata: &SyncMetadata) -> KbResult<()> {
        let _guard = self.lock.lock().await;
        let mut export = self.read().await?;

        let record = export
            .records
            .iter_mut()
            .find(|r| r.id == metadata.content_id)
            .ok_or_else(|| {
                KbSyncError::SourceError(format!("record {} not found in source", metadata.content_id))
            })?;
        record.mark_synced(metadata);

        self.write(&export).await?;
        debug!(content_id = %metadata.content_id, version_id = %metadata.version_id, "Persisted sync metadata");
        Ok(())
    }
}
