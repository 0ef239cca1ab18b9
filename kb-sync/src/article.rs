//! Per-record upsert against the knowledge base.
//!
//! The newest version of the article is located by external id, then one of
//! four transitions is applied depending on what was found. Publishing is a
//! separate step whose failure never fails the record.

use crate::client::KnowledgeApi;
use crate::context::RunContext;
use crate::error::{KbResult, KbSyncError};
use crate::pipeline::PayloadBuilder;
use crate::soql;
use crate::types::{
    ArticleVersion, PublicationState, PublishStatus, SourceRecord, SyncOperation, SyncResult
};
use metrics::counter;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const RECORD_TYPE_FIELD: &str = "RecordTypeId";

/// What the lookup found for one external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleState {
    NotExists,
    DraftExists(ArticleVersion),
    OnlineExists(ArticleVersion),
    OtherExists(ArticleVersion)
}

pub struct ArticleSyncer<'a> {
    api: &'a dyn KnowledgeApi,
    builder: &'a PayloadBuilder
}

impl<'a> ArticleSyncer<'a> {
    pub fn new(api: &'a dyn KnowledgeApi, builder: &'a PayloadBuilder) -> Self {
        Self { api, builder }
    }

    fn article_type(&self) -> &str {
        &self.builder.config().article_type
    }

    fn external_id_field(&self) -> &str {
        &self.builder.config().external_id_field
    }

    /// Upserts one record. Record-level failures are returned as a failed
    /// `SyncResult`; only run-aborting errors are returned as `Err`.
    pub async fn upsert(&self, ctx: &mut RunContext, record: &SourceRecord) -> KbResult<SyncResult> {
        match self.write(ctx, record).await {
            Ok(result) => {
                counter!("kbsync_records_synced_total").increment(1);
                Ok(result)
            }
            Err(e) if e.aborts_run() => Err(e),
            Err(e) => {
                warn!(content_id = %record.id, error = %e, "Failed to sync record");
                counter!("kbsync_records_failed_total").increment(1);
                Ok(SyncResult::failed(&record.id, e))
            }
        }
    }

    async fn write(&self, ctx: &mut RunContext, record: &SourceRecord) -> KbResult<SyncResult> {
        let state = self.lookup(ctx, &record.id).await?;
        debug!(content_id = %record.id, state = ?state, "Resolved article state");

        let mut result = match state {
            ArticleState::NotExists => {
                let mut payload = self.builder.build(record, true);
                if let Some(record_type_id) = self.record_type_id(ctx).await? {
                    payload.insert(RECORD_TYPE_FIELD.to_string(), Value::String(record_type_id));
                }
                let version_id = self.create(ctx, &payload).await?;
                let master_id = self.master_id_of(ctx, &version_id).await?;
                info!(content_id = %record.id, version_id = %version_id, "Created article");
                SyncResult::succeeded(&record.id, master_id, version_id, SyncOperation::Create)
            }
            ArticleState::DraftExists(version) => {
                let payload = self.builder.build(record, false);
                self.update(ctx, &version.version_id, &payload).await?;
                info!(content_id = %record.id, version_id = %version.version_id, "Updated draft");
                SyncResult::succeeded(
                    &record.id,
                    version.master_id,
                    version.version_id,
                    SyncOperation::Update
                )
            }
            ArticleState::OnlineExists(version) => {
                let draft_id = self.create_draft(ctx, &version.master_id).await?;
                let payload = self.builder.build(record, false);
                self.update(ctx, &draft_id, &payload).await?;
                info!(
                    content_id = %record.id,
                    master_id = %version.master_id,
                    version_id = %draft_id,
                    "Opened new draft of published article"
                );
                SyncResult::succeeded(&record.id, version.master_id, draft_id, SyncOperation::EditOnline)
            }
            ArticleState::OtherExists(version) => {
                warn!(
                    content_id = %record.id,
                    status = %version.publish_status,
                    "Article is neither draft nor online, updating in place"
                );
                let payload = self.builder.build(record, false);
                self.update(ctx, &version.version_id, &payload).await?;
                let mut result = SyncResult::succeeded(
                    &record.id,
                    version.master_id,
                    version.version_id,
                    SyncOperation::Update
                );
                result.add_warning(format!(
                    "Updated article in status {} directly",
                    version.publish_status
                ));
                result
            }
        };

        if self.builder.config().publish_articles {
            if let Some(version_id) = result.version_id.clone() {
                match self.publish(ctx, &version_id).await {
                    Ok(()) => result.publish_status = Some(PublicationState::Online),
                    Err(e) if e.aborts_run() => return Err(e),
                    Err(e) => {
                        warn!(content_id = %record.id, error = %e, "Publish failed, article left as draft");
                        counter!("kbsync_publish_warnings_total").increment(1);
                        result.add_warning(format!("Publish failed: {e}"));
                    }
                }
            }
        }

        Ok(result)
    }

    /// Draft first, then online, then any status.
    pub async fn lookup(&self, ctx: &mut RunContext, external_id: &str) -> KbResult<ArticleState> {
        let probes = [Some("Draft"), Some("Online"), None];

        for status in probes {
            let query = soql::version_lookup(
                self.article_type(),
                self.external_id_field(),
                external_id,
                status
            );
            let rows = self.query(ctx, &query).await?;
            let Some(row) = rows.first() else {
                continue;
            };
            // A row that exists but cannot be read must not fall through to a create.
            let version = ArticleVersion::from_row(row, self.external_id_field()).ok_or_else(|| {
                KbSyncError::UnexpectedResponse(format!(
                    "unreadable article version for {external_id}: {row}"
                ))
            })?;

            return Ok(match version.publish_status {
                PublishStatus::Draft => ArticleState::DraftExists(version),
                PublishStatus::Online => ArticleState::OnlineExists(version),
                _ => ArticleState::OtherExists(version)
            });
        }

        Ok(ArticleState::NotExists)
    }

    async fn query(&self, ctx: &mut RunContext, soql: &str) -> KbResult<Vec<Value>> {
        let session = ctx.session().await?;
        let result = self.api.query(&session, soql).await;
        ctx.observe(&result).await;
        result
    }

    async fn create(&self, ctx: &mut RunContext, payload: &Map<String, Value>) -> KbResult<String> {
        let session = ctx.session().await?;
        let path = format!("/sobjects/{}", self.article_type());
        let body = Value::Object(payload.clone());
        let result = self.api.request(&session, Method::POST, &path, Some(&body)).await;
        ctx.observe(&result).await;

        result?
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| KbSyncError::UnexpectedResponse("create returned no id".to_string()))
    }

    async fn update(
        &self,
        ctx: &mut RunContext,
        version_id: &str,
        payload: &Map<String, Value>
    ) -> KbResult<()> {
        let session = ctx.session().await?;
        let path = format!("/sobjects/{}/{}", self.article_type(), version_id);
        let body = Value::Object(payload.clone());
        let result = self.api.request(&session, Method::PATCH, &path, Some(&body)).await;
        ctx.observe(&result).await;
        result.map(|_| ())
    }

    async fn create_draft(&self, ctx: &mut RunContext, master_id: &str) -> KbResult<String> {
        let session = ctx.session().await?;
        let result = self.api.create_draft_from_master(&session, master_id).await;
        ctx.observe(&result).await;
        result
    }

    async fn publish(&self, ctx: &mut RunContext, version_id: &str) -> KbResult<()> {
        let session = ctx.session().await?;
        let result = self.api.publish(&session, &[version_id.to_string()]).await;
        ctx.observe(&result).await;
        result
    }

    async fn master_id_of(&self, ctx: &mut RunContext, version_id: &str) -> KbResult<String> {
        let query = soql::master_id_lookup(self.article_type(), version_id);
        let rows = self.query(ctx, &query).await?;
        rows.first()
            .and_then(|row| row.get("KnowledgeArticleId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                KbSyncError::UnexpectedResponse(format!("no master id for version {version_id}"))
            })
    }

    /// Resolves `recordTypeName` once per run. A name that does not resolve
    /// is logged and the field is left out.
    async fn record_type_id(&self, ctx: &mut RunContext) -> KbResult<Option<String>> {
        let Some(name) = self.builder.config().record_type_name.as_deref() else {
            return Ok(None);
        };
        let key = format!("{}/{}", self.article_type(), name);
        if let Some(cached) = ctx.cached_record_type(&key) {
            return Ok(cached);
        }

        let query = soql::record_type_lookup(self.article_type(), name);
        let rows = self.query(ctx, &query).await?;
        let id = rows
            .first()
            .and_then(|row| row.get("Id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if id.is_none() {
            warn!(record_type = name, "Record type not found, articles created without it");
        }
        ctx.remember_record_type(key, id.clone());
        Ok(id)
    }
}
