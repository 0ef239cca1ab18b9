use crate::article::ArticleSyncer;
use crate::auth::TokenProvider;
use crate::batch::{BatchOutcome, BatchSink, RunSummary, run_batches};
use crate::client::KnowledgeApi;
use crate::context::RunContext;
use crate::delta;
use crate::error::KbResult;
use crate::pipeline::PayloadBuilder;
use crate::provisioning::{FieldProvisioner, prepare_fields};
use crate::source::ContentSource;
use crate::types::{SourceRecord, SyncMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::{EffectiveConfig, ExportMode, ServiceIdentity, SiteConfigSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
    Empty
}

impl RunStatus {
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.total_processed == 0 {
            Self::Empty
        } else if summary.total_failed == 0 {
            Self::Success
        } else if summary.total_success == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub site_id: String,
    pub export_mode: ExportMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub skipped: usize,
    pub summary: RunSummary
}

impl RunReport {
    fn new(site_id: &str, export_mode: ExportMode) -> Self {
        Self {
            site_id: site_id.to_string(),
            export_mode,
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Empty,
            skipped: 0,
            summary: RunSummary::default()
        }
    }

    fn complete(&mut self, summary: RunSummary) {
        self.status = RunStatus::from_summary(&summary);
        self.summary = summary;
        self.completed_at = Some(Utc::now());
    }
}

/// Payload a dry run would send for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadPreview {
    pub content_id: String,
    pub previously_synced: bool,
    pub payload: Map<String, Value>
}

pub struct KnowledgeSyncService {
    identity: ServiceIdentity,
    api: Arc<dyn KnowledgeApi>,
    auth: Arc<dyn TokenProvider>,
    source: Arc<dyn ContentSource>,
    provisioner: Option<Arc<dyn FieldProvisioner>>
}

impl KnowledgeSyncService {
    pub fn new(
        identity: ServiceIdentity,
        api: Arc<dyn KnowledgeApi>,
        auth: Arc<dyn TokenProvider>,
        source: Arc<dyn ContentSource>
    ) -> Self {
        Self {
            identity,
            api,
            auth,
            source,
            provisioner: None
        }
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn FieldProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Resolves the site's configuration and runs an export. Configuration
    /// errors are returned before any remote call.
    pub async fn run_site(
        &self,
        sites: &SiteConfigSet,
        site_id: &str,
        mode: Option<ExportMode>
    ) -> KbResult<RunReport> {
        let mut config = sites.effective(site_id)?;
        if let Some(mode) = mode {
            config.export_mode = mode;
        }
        self.run(site_id, config).await
    }

    pub async fn run(&self, site_id: &str, config: EffectiveConfig) -> KbResult<RunReport> {
        let mut report = RunReport::new(site_id, config.export_mode);
        info!(
            site = site_id,
            mode = ?config.export_mode,
            article_type = %config.article_type,
            "Starting knowledge sync"
        );

        let mut ctx = RunContext::new(self.identity.clone(), self.auth.clone());
        ctx.session().await?;

        let config = match &self.provisioner {
            Some(provisioner) => prepare_fields(provisioner.as_ref(), &mut ctx, config).await?,
            None => config
        };

        let (records, skipped) = select_records(self.source.as_ref(), &config).await?;
        report.skipped = skipped;
        info!(count = records.len(), skipped, "Selected records for export");

        let builder = PayloadBuilder::new(config);
        let mut sink = ArticleSink {
            syncer: ArticleSyncer::new(self.api.as_ref(), &builder),
            ctx: &mut ctx,
            source: self.source.as_ref()
        };
        let batch_size = builder.config().batch_size as usize;
        let summary = run_batches(&records, batch_size, &mut sink).await?;

        report.complete(summary);
        info!(
            site = site_id,
            status = ?report.status,
            processed = report.summary.total_processed,
            succeeded = report.summary.total_success,
            failed = report.summary.total_failed,
            "Knowledge sync completed"
        );

        Ok(report)
    }

    /// Builds the payloads a run would send, without touching the
    /// knowledge base.
    pub async fn preview(&self, config: EffectiveConfig) -> KbResult<Vec<PayloadPreview>> {
        preview(self.source.as_ref(), config).await
    }
}

/// Builds the payloads a run over `source` would send. Records never synced
/// are previewed as creates.
pub async fn preview(source: &dyn ContentSource, config: EffectiveConfig) -> KbResult<Vec<PayloadPreview>> {
    let (records, _) = select_records(source, &config).await?;
    let builder = PayloadBuilder::new(config);

    Ok(records
        .iter()
        .map(|record| {
            let previously_synced = record.sync_article_id.is_some();
            PayloadPreview {
                content_id: record.id.clone(),
                previously_synced,
                payload: builder.build(record, !previously_synced)
            }
        })
        .collect())
}

/// Online records selected by the export mode, and how many were left out.
pub async fn select_records(
    source: &dyn ContentSource,
    config: &EffectiveConfig
) -> KbResult<(Vec<SourceRecord>, usize)> {
    let listed = source
        .list_records(&config.content_folder_ids, config.recursive_folders)
        .await?;
    let total = listed.len();

    let selected: Vec<SourceRecord> = listed
        .into_iter()
        .filter(|r| r.online)
        .filter(|r| {
            let include = delta::include(r, config.export_mode);
            if !include {
                debug!(content_id = %r.id, "Unchanged since last sync, skipped");
            }
            include
        })
        .collect();

    let skipped = total - selected.len();
    Ok((selected, skipped))
}

struct ArticleSink<'a> {
    syncer: ArticleSyncer<'a>,
    ctx: &'a mut RunContext,
    source: &'a dyn ContentSource
}

#[async_trait]
impl BatchSink for ArticleSink<'_> {
    async fn export_batch(&mut self, batch: &[SourceRecord]) -> KbResult<BatchOutcome> {
        let mut results = Vec::with_capacity(batch.len());
        for record in batch {
            match self.syncer.upsert(self.ctx, record).await {
                Ok(result) => results.push(result),
                Err(e) => return Ok(BatchOutcome::aborted(results, e))
            }
        }
        Ok(BatchOutcome::completed(results))
    }

    async fn persist_metadata(&mut self, metadata: &SyncMetadata) -> KbResult<()> {
        self.source.persist_sync_metadata(metadata).await
    }
}
