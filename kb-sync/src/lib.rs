//! # kb-sync
//!
//! Exports content records into a knowledge base as versioned articles.
//!
//! A run resolves the site's configuration, provisions missing custom
//! fields, selects the records to export, and upserts them batch by batch
//! through the article state machine. Sync bookkeeping is written back to
//! the content source for every record that succeeded.

pub mod article;
pub mod auth;
pub mod batch;
pub mod client;
pub mod context;
pub mod delta;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod provisioning;
pub mod soql;
pub mod source;
pub mod sync;
pub mod transform;
pub mod types;

pub use article::{ArticleState, ArticleSyncer};
pub use auth::{ClientCredentialsAuth, Session, TokenProvider};
pub use batch::{BatchOutcome, BatchSink, RunSummary, run_batches};
pub use client::{HttpKnowledgeClient, KnowledgeApi, create_knowledge_client};
pub use context::RunContext;
pub use error::{KbResult, KbSyncError};
pub use pipeline::PayloadBuilder;
pub use provisioning::{DescribeFieldProvisioner, FieldProvisioner, FieldStatus};
pub use source::{ContentSource, JsonFileSource};
pub use sync::{KnowledgeSyncService, PayloadPreview, RunReport, RunStatus, preview};
pub use types::{SourceRecord, SyncMetadata, SyncResult};
