//! OCR engine adapters.
//!
//! Two interchangeable back-ends sit behind one trait so the orchestrator
//! depends only on the interface and tests can substitute fakes:
//!
//! * [`tesseract::TesseractEngine`] — local/offline, per-token confidence
//!   (feature `tesseract`)
//! * [`vision::GoogleVisionEngine`] — remote/cloud fallback, fixed
//!   engine-level confidence
//!
//! Engines never error upward: any internal failure degrades to
//! [`ExtractionResult::empty`] and the orchestrator proceeds as if nothing
//! was recognised.

use crate::output::ExtractionResult;
use async_trait::async_trait;
use image::DynamicImage;

#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod vision;

/// One OCR back-end.
///
/// `extract` is infallible by contract: engines recover their own failures
/// and report them as an empty result with zero confidence.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Which arbitration slot this engine fills.
    fn kind(&self) -> crate::output::EngineKind;

    /// Recognise text in a conditioned bitmap and extract a weight from it.
    async fn extract(&self, image: &DynamicImage) -> ExtractionResult;
}
