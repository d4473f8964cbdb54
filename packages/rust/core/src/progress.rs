//! Progress callbacks for ingestion runs.

use pokedex_shared::RecordId;

use crate::ingest::IngestReport;

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already in the store.
    Existing,
    /// The source has nothing under this id.
    NotFound,
    /// Missing or unparseable required fields.
    Malformed,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a record is written. `added` counts this run only.
    fn record_added(&self, label: &str, added: u64, per_run_cap: u64);
    /// Called when a candidate is skipped.
    fn record_skipped(&self, id: RecordId, reason: SkipReason);
    /// Called when the run completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_added(&self, _label: &str, _added: u64, _per_run_cap: u64) {}
    fn record_skipped(&self, _id: RecordId, _reason: SkipReason) {}
    fn done(&self, _report: &IngestReport) {}
}
