//! Incremental export selection.

use crate::types::SourceRecord;
use config::ExportMode;

/// Whether `record` should be exported in `mode`.
///
/// Full mode exports everything. Delta mode exports records never synced,
/// and records modified strictly after their last sync.
pub fn include(record: &SourceRecord, mode: ExportMode) -> bool {
    match mode {
        ExportMode::Full => true,
        ExportMode::Delta => match record.last_sync_time {
            None => true,
            Some(last_sync) => record.last_modified > last_sync
        }
    }
}
