//! Processing-log sink: the storage seam for per-attempt records.
//!
//! The pipeline produces one [`ProcessingLogEntry`] per run and hands it to
//! whatever storage the application injected — a database table, a message
//! queue, a flat file. The crate only ever inserts; it never reads entries
//! back, and a failed write must never change the outcome the caller sees.
//! Write serialisation is the storage layer's job, which is why the trait is
//! synchronous and takes `&self`.

use crate::error::LogSinkError;
use crate::output::ProcessingLogEntry;

/// Append-only storage for processing attempts.
///
/// Implementations must be cheap enough to call inline at the end of a run;
/// anything slower should enqueue internally and flush elsewhere.
pub trait ProcessingLogSink: Send + Sync {
    /// Persist one attempt. Errors are reported to the operational log by
    /// the orchestrator and otherwise ignored — roll back any partial write
    /// before returning `Err`.
    fn record(&self, entry: &ProcessingLogEntry) -> Result<(), LogSinkError>;
}
