//! Fixed-size batching of exported records.

use crate::error::{KbResult, KbSyncError};
use crate::types::{SourceRecord, SyncMetadata, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Results of one exported batch, in record order.
///
/// When `abort` is set the sink stopped early: `results` covers only the
/// records handled before the run-aborting error.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<SyncResult>,
    pub abort: Option<KbSyncError>
}

impl BatchOutcome {
    pub fn completed(results: Vec<SyncResult>) -> Self {
        Self {
            results,
            abort: None
        }
    }

    pub fn aborted(results: Vec<SyncResult>, error: KbSyncError) -> Self {
        Self {
            results,
            abort: Some(error)
        }
    }
}

/// Receives each batch in order and stores sync metadata for successes.
#[async_trait]
pub trait BatchSink: Send {
    /// Exports one batch. An `Err` fails every record in the batch, or stops
    /// the run when it is run-aborting; an aborted outcome stops the run after
    /// its finished results are recorded.
    async fn export_batch(&mut self, batch: &[SourceRecord]) -> KbResult<BatchOutcome>;

    async fn persist_metadata(&mut self, metadata: &SyncMetadata) -> KbResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub content_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_processed: usize,
    pub total_success: usize,
    pub total_failed: usize,
    pub metadata_failures: usize,
    pub batches: usize,
    pub details: Vec<SyncResult>,
    pub errors: Vec<RecordError>
}

impl RunSummary {
    fn record(&mut self, result: SyncResult) {
        self.total_processed += 1;
        if result.success {
            self.total_success += 1;
        } else {
            self.total_failed += 1;
            self.errors.push(RecordError {
                content_id: result.content_id.clone(),
                error: result.error.clone().unwrap_or_default(),
                timestamp: Utc::now()
            });
        }
        self.details.push(result);
    }
}

/// Number of batches `count` records split into.
pub fn batch_count(count: usize, batch_size: usize) -> usize {
    count.div_ceil(batch_size.max(1))
}

/// Sends `records` to `sink` in contiguous slices of `batch_size`, one
/// slice at a time, and persists metadata for every successful record.
pub async fn run_batches(
    records: &[SourceRecord],
    batch_size: usize,
    sink: &mut dyn BatchSink
) -> KbResult<RunSummary> {
    let batch_size = batch_size.max(1);
    let total_batches = batch_count(records.len(), batch_size);
    let mut summary = RunSummary::default();

    for (index, batch) in records.chunks(batch_size).enumerate() {
        info!(batch = index + 1, total_batches, size = batch.len(), "Exporting batch");
        summary.batches += 1;

        let outcome = match sink.export_batch(batch).await {
            Ok(outcome) => outcome,
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => {
                error!(batch = index + 1, error = %e, "Batch export failed");
                for record in batch {
                    summary.record(SyncResult::failed(&record.id, &e));
                }
                continue;
            }
        };

        let handled = match outcome.abort {
            Some(_) => outcome.results.len().min(batch.len()),
            None => batch.len()
        };
        let mut results = outcome.results.into_iter();
        for record in &batch[..handled] {
            let result = results
                .next()
                .unwrap_or_else(|| SyncResult::failed(&record.id, "no result returned for record"));

            if let Some(metadata) = result.metadata(Utc::now()) {
                if let Err(e) = sink.persist_metadata(&metadata).await {
                    warn!(content_id = %record.id, error = %e, "Failed to persist sync metadata");
                    summary.metadata_failures += 1;
                }
            }
            summary.record(result);
        }

        if let Some(e) = outcome.abort {
            error!(
                batch = index + 1,
                recorded = summary.total_processed,
                error = %e,
                "Run aborted"
            );
            return Err(e);
        }
    }

    info!(
        processed = summary.total_processed,
        succeeded = summary.total_success,
        failed = summary.total_failed,
        metadata_failures = summary.metadata_failures,
        "Export finished"
    );

    Ok(summary)
}
