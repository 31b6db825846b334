//! Error types for the weightlens library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`WeightOcrError`] — **Fatal**: the pipeline cannot reach extraction at
//!   all (image unreachable, corrupt bytes, no primary engine available).
//!   Surfaces to the caller as a `ProcessingOutcome` with `success: false`
//!   and `engine: "error"`.
//!
//! * [`StageError`] — **Non-fatal**: one conditioning stage or one engine
//!   internal step failed. Recovered at the point of failure: the
//!   conditioner passes through the best image it has, the engine returns
//!   the empty result. Never propagated upward.
//!
//! The separation keeps the degradation contract explicit: only acquisition
//! and orchestrator-level faults abort a run; everything downstream degrades
//! to a best-effort success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the weightlens pipeline.
///
/// Stage-local failures use [`StageError`] and are swallowed where they
/// occur rather than propagated here.
#[derive(Debug, Error)]
pub enum WeightOcrError {
    // ── Acquisition errors ────────────────────────────────────────────────
    /// Image file was not found at the given path.
    #[error("image not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but the fetch failed.
    #[error("failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// Fetch exceeded the configured timeout.
    #[error("fetch timed out after {secs}s for '{url}'")]
    FetchTimeout { url: String, secs: u64 },

    /// Remote source answered with a non-success HTTP status.
    #[error("source '{url}' answered HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    /// The bytes were retrieved but are not a decodable PNG/JPEG image.
    #[error("image data is corrupt or unsupported: {detail}")]
    DecodeFailed { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No implementation available for the named engine slot.
    ///
    /// Happens for the primary slot when the `tesseract` feature is off and
    /// no engine was injected through `ProcessingConfig`.
    #[error("OCR engine '{engine}' is not configured.\n{hint}")]
    EngineNotConfigured { engine: &'static str, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (blocking-task panic, runtime shutdown).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal, stage-local failure.
///
/// Created inside the conditioner and the engine adapters, logged at `warn`
/// level, and discarded. Carried as a value only so recovery sites can log
/// a uniform message.
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed: {detail}")]
pub struct StageError {
    pub stage: &'static str,
    pub detail: String,
}

impl StageError {
    pub fn new(stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// A log-sink write failure. Swallowed by the orchestrator, reported to the
/// operational log only.
#[derive(Debug, Error)]
#[error("processing-log write failed: {0}")]
pub struct LogSinkError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_not_found_display() {
        let e = WeightOcrError::ImageNotFound {
            path: PathBuf::from("/tmp/missing.png"),
        };
        assert!(e.to_string().contains("/tmp/missing.png"));
    }

    #[test]
    fn fetch_timeout_display() {
        let e = WeightOcrError::FetchTimeout {
            url: "https://cdn.example/label.jpg".into(),
            secs: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("10s"), "got: {msg}");
        assert!(msg.contains("label.jpg"));
    }

    #[test]
    fn engine_not_configured_display() {
        let e = WeightOcrError::EngineNotConfigured {
            engine: "primary",
            hint: "enable the `tesseract` feature or inject an engine".into(),
        };
        assert!(e.to_string().contains("primary"));
        assert!(e.to_string().contains("tesseract"));
    }

    #[test]
    fn stage_error_display() {
        let e = StageError::new("rotation", "no lines detected");
        assert_eq!(e.to_string(), "stage 'rotation' failed: no lines detected");
    }
}
