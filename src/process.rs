//! Orchestration: the end-to-end weight-extraction state machine.
//!
//! One invocation walks a linear, forward-only sequence:
//!
//! ```text
//! ACQUIRE → CONDITION → PRIMARY_EXTRACT ──conf ≥ threshold──▶ SUCCESS
//!                            │
//!                       SECONDARY_EXTRACT → ARBITRATE → SUCCESS
//! ```
//!
//! Arbitration keeps whichever result has the strictly higher confidence;
//! ties go to the primary result, which is the default branch and was
//! computed first. Any error in acquisition, conditioning, or engine
//! resolution transitions straight to FAILURE — which still records a
//! processing-log entry with `engine: "error"` so failed attempts show up
//! in offline analysis.
//!
//! There is no internal timeout or cancellation point: the ~2-second latency
//! target is met by the cost of the stages themselves. A caller that needs a
//! hard deadline wraps the whole call in its own cancellation mechanism
//! (e.g. `tokio::time::timeout`).

use crate::config::ProcessingConfig;
use crate::engine::vision::GoogleVisionEngine;
use crate::engine::OcrEngine;
use crate::error::WeightOcrError;
use crate::output::{EngineKind, ExtractionResult, ProcessingLogEntry, ProcessingOutcome};
use crate::pipeline::{acquire, condition};
use image::DynamicImage;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Process an image source (local path, `file://`, or HTTP/HTTPS URL) into a
/// weight-extraction outcome.
///
/// This is the primary entry point for the library. It never returns an
/// `Err`: failures are folded into the outcome (`success: false`,
/// `engine: "error"`) so the caller has one uniform shape to act on —
/// persist the weight, prompt for manual entry, or retry.
///
/// `registration_id` links the attempt to a business record for log
/// correlation; when `None`, logging is skipped entirely.
pub async fn process(
    source: impl AsRef<str>,
    registration_id: Option<&str>,
    config: &ProcessingConfig,
) -> ProcessingOutcome {
    let source = source.as_ref();
    info!("starting weight extraction: {}", source);
    let start = Instant::now();
    let result = run_from_source(source, config).await;
    finish(result, registration_id, config, start)
}

/// Process an in-memory image byte stream (PNG/JPEG).
///
/// Same pipeline as [`process`] minus the acquisition I/O; recommended when
/// the image arrives from an upload buffer rather than a file or URL.
pub async fn process_bytes(
    bytes: &[u8],
    registration_id: Option<&str>,
    config: &ProcessingConfig,
) -> ProcessingOutcome {
    let start = Instant::now();
    let result = match acquire::decode_bytes(bytes) {
        Ok(image) => run_from_image(image, config).await,
        Err(e) => Err(e),
    };
    finish(result, registration_id, config, start)
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally; use it from non-async
/// callers only.
pub fn process_sync(
    source: impl AsRef<str>,
    registration_id: Option<&str>,
    config: &ProcessingConfig,
) -> Result<ProcessingOutcome, WeightOcrError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| WeightOcrError::Internal(format!("failed to create tokio runtime: {e}")))?;
    Ok(runtime.block_on(process(source, registration_id, config)))
}

// ── Stage sequencing ─────────────────────────────────────────────────────

async fn run_from_source(
    source: &str,
    config: &ProcessingConfig,
) -> Result<ExtractionResult, WeightOcrError> {
    let raw = acquire::acquire_image(source, config).await?;
    run_from_image(raw, config).await
}

async fn run_from_image(
    raw: DynamicImage,
    config: &ProcessingConfig,
) -> Result<ExtractionResult, WeightOcrError> {
    let conditioned = condition::condition(raw).await?;

    let primary = resolve_primary(config)?;
    let primary_result = primary.extract(&conditioned).await;
    debug!(
        confidence = primary_result.confidence,
        "primary extraction complete"
    );

    if primary_result.confidence >= config.fallback_threshold {
        return Ok(primary_result);
    }

    info!(
        primary = primary_result.confidence,
        threshold = config.fallback_threshold,
        "primary confidence low, falling back to secondary engine"
    );
    let secondary = resolve_secondary(config);
    let secondary_result = secondary.extract(&conditioned).await;

    // Ties favour primary: it is the default branch, computed first.
    if secondary_result.confidence > primary_result.confidence {
        Ok(secondary_result)
    } else {
        Ok(primary_result)
    }
}

/// Fold the extraction result into the final outcome, attach the end-to-end
/// wall time, and fire the log sink.
fn finish(
    result: Result<ExtractionResult, WeightOcrError>,
    registration_id: Option<&str>,
    config: &ProcessingConfig,
    start: Instant,
) -> ProcessingOutcome {
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(extraction) => {
            // Injected engines are not required to range-gate, so the
            // outcome weight is always validated here.
            let extracted_weight = extraction
                .weight
                .and_then(|w| config.parser().validate(w));

            record_attempt(
                config,
                registration_id,
                &extraction.text,
                extraction.confidence,
                processing_time_ms,
                extraction.engine,
            );

            info!(
                engine = %extraction.engine,
                confidence = extraction.confidence,
                ?extracted_weight,
                processing_time_ms,
                "weight extraction complete"
            );
            ProcessingOutcome {
                success: true,
                extracted_weight,
                confidence_score: extraction.confidence,
                engine: extraction.engine,
                processing_time_ms,
                error: None,
            }
        }
        Err(e) => {
            error!(error = %e, processing_time_ms, "weight extraction failed");
            record_attempt(
                config,
                registration_id,
                "",
                0.0,
                processing_time_ms,
                EngineKind::Error,
            );
            ProcessingOutcome {
                success: false,
                extracted_weight: None,
                confidence_score: 0.0,
                engine: EngineKind::Error,
                processing_time_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

// ── Engine resolution ────────────────────────────────────────────────────

/// Resolve the primary engine: an injected engine takes precedence over the
/// built-in Tesseract adapter (feature `tesseract`).
fn resolve_primary(config: &ProcessingConfig) -> Result<Arc<dyn OcrEngine>, WeightOcrError> {
    if let Some(ref engine) = config.primary_engine {
        return Ok(Arc::clone(engine));
    }

    #[cfg(feature = "tesseract")]
    {
        Ok(Arc::new(crate::engine::tesseract::TesseractEngine::new(
            config.ocr_language.clone(),
            config.char_whitelist.clone(),
            config.parser(),
        )))
    }

    #[cfg(not(feature = "tesseract"))]
    {
        Err(WeightOcrError::EngineNotConfigured {
            engine: "primary",
            hint: "enable the `tesseract` feature or inject an engine via \
                   ProcessingConfig::builder().primary_engine(...)"
                .into(),
        })
    }
}

/// Resolve the secondary engine. Always succeeds: the built-in remote
/// adapter degrades to the empty result when no API key is configured.
fn resolve_secondary(config: &ProcessingConfig) -> Arc<dyn OcrEngine> {
    if let Some(ref engine) = config.secondary_engine {
        return Arc::clone(engine);
    }

    let api_key = config
        .vision_api_key
        .clone()
        .or_else(|| std::env::var("GOOGLE_VISION_API_KEY").ok());
    Arc::new(GoogleVisionEngine::new(
        api_key,
        config.vision_endpoint.clone(),
        config.secondary_confidence,
        config.api_timeout_secs,
        config.parser(),
    ))
}

// ── Log sink side effect ─────────────────────────────────────────────────

/// Fire-and-forget: persist the attempt when a registration reference was
/// supplied. A sink failure is reported to the operational log and must
/// never alter the outcome.
fn record_attempt(
    config: &ProcessingConfig,
    registration_id: Option<&str>,
    extracted_text: &str,
    confidence_score: f64,
    processing_time_ms: u64,
    engine: EngineKind,
) {
    let (Some(registration_id), Some(sink)) = (registration_id, config.log_sink.as_ref()) else {
        return;
    };

    let entry = ProcessingLogEntry {
        registration_id: registration_id.to_string(),
        extracted_text: extracted_text.to_string(),
        confidence_score,
        processing_time_ms,
        engine,
        created_at: SystemTime::now(),
    };
    if let Err(e) = sink.record(&entry) {
        warn!(error = %e, "failed to persist processing log entry");
    }
}
