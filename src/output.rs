//! Result types produced by the weight-extraction pipeline.
//!
//! Three layers of output reflect three audiences:
//!
//! * [`ExtractionResult`] — what a single OCR engine saw. Immutable value
//!   produced by each adapter; the orchestrator compares two of these during
//!   arbitration and never mutates them.
//! * [`ProcessingOutcome`] — the end-to-end verdict handed back to the
//!   caller, who decides persistence, manual-entry fallback, or retry.
//! * [`ProcessingLogEntry`] — the persisted mirror of an attempt, written
//!   through [`crate::sink::ProcessingLogSink`] for offline accuracy and
//!   performance analysis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Which back-end produced a result.
///
/// `Error` is reserved for the failure path: the orchestrator reports it when
/// no engine got to run at all (unreachable image, decode failure, missing
/// engine), so downstream analysis can separate "OCR read nothing" from
/// "the pipeline never reached OCR".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local/offline engine (Tesseract).
    Primary,
    /// Remote/cloud fallback engine (Google Vision).
    Secondary,
    /// No engine ran — the pipeline failed before extraction.
    Error,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Primary => "primary",
            EngineKind::Secondary => "secondary",
            EngineKind::Error => "error",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one OCR engine extracted from a conditioned bitmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Trimmed recognised text. Empty when the engine failed or saw nothing.
    pub text: String,
    /// Parsed weight in kilograms, already passed through the plausible-range
    /// gate. `None` is a valid outcome, not an error.
    pub weight: Option<f64>,
    /// Normalised engine confidence in `[0, 1]`.
    pub confidence: f64,
    /// Which engine produced this result.
    pub engine: EngineKind,
}

impl ExtractionResult {
    /// The degraded result an engine returns when it cannot produce anything:
    /// empty text, no weight, zero confidence. Engines never error upward.
    pub fn empty(engine: EngineKind) -> Self {
        Self {
            text: String::new(),
            weight: None,
            confidence: 0.0,
            engine,
        }
    }
}

/// Final result of one end-to-end pipeline run.
///
/// Always returned — never an `Err` — so the caller can uniformly inspect
/// `success`, fall back to manual entry on a null weight, and persist
/// whatever happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// `false` only when the pipeline failed before extraction (unreachable
    /// image, decode failure, missing engine). A run that extracted no
    /// weight is still a success.
    pub success: bool,
    /// Validated weight in kilograms, rounded to 2 decimals.
    pub extracted_weight: Option<f64>,
    /// Confidence of the winning engine, `0.0` on failure.
    pub confidence_score: f64,
    /// Winning engine, or [`EngineKind::Error`] on failure.
    pub engine: EngineKind,
    /// Wall-clock time of the whole pipeline, acquisition included.
    pub processing_time_ms: u64,
    /// Stringified cause when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One persisted processing attempt.
///
/// Append-only: entries are inserted through the log sink and never read or
/// updated by this crate. `registration_id` links the attempt to the business
/// record it was performed for.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingLogEntry {
    pub registration_id: String,
    pub extracted_text: String,
    pub confidence_score: f64,
    pub processing_time_ms: u64,
    pub engine: EngineKind,
    pub created_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&EngineKind::Primary).unwrap(),
            "\"primary\""
        );
        assert_eq!(
            serde_json::to_string(&EngineKind::Error).unwrap(),
            "\"error\""
        );
        assert_eq!(EngineKind::Secondary.to_string(), "secondary");
    }

    #[test]
    fn empty_result_is_degraded() {
        let r = ExtractionResult::empty(EngineKind::Secondary);
        assert!(r.text.is_empty());
        assert!(r.weight.is_none());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.engine, EngineKind::Secondary);
    }

    #[test]
    fn outcome_error_field_skipped_when_none() {
        let o = ProcessingOutcome {
            success: true,
            extracted_weight: Some(2.5),
            confidence_score: 0.85,
            engine: EngineKind::Primary,
            processing_time_ms: 120,
            error: None,
        };
        let json = serde_json::to_string(&o).unwrap();
        assert!(!json.contains("error"), "got: {json}");
        assert!(json.contains("\"engine\":\"primary\""));
    }
}
