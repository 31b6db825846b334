//! Primary engine: local Tesseract recognition via leptess.
//!
//! ## Why spawn_blocking?
//!
//! leptess wraps the Tesseract/Leptonica C libraries, which are synchronous
//! and keep internal state per instance. `tokio::task::spawn_blocking` moves
//! recognition onto the blocking thread pool, and a fresh `LepTess` per call
//! keeps concurrent invocations fully independent — no shared engine state,
//! no cross-run locking.
//!
//! ## Confidence
//!
//! Tesseract reports per-token confidences 0–100 in its TSV output. The
//! engine averages the tokens with confidence > 0 and divides by 100; a
//! page with no confident token scores 0.0, which is exactly what pushes
//! the orchestrator to the secondary engine.

use crate::engine::OcrEngine;
use crate::error::StageError;
use crate::output::{EngineKind, ExtractionResult};
use crate::parser::WeightParser;
use crate::pipeline::encode;
use async_trait::async_trait;
use image::DynamicImage;
use leptess::{LepTess, Variable};
use tracing::{debug, warn};

/// Local/offline OCR adapter.
pub struct TesseractEngine {
    language: String,
    char_whitelist: String,
    parser: WeightParser,
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>, char_whitelist: impl Into<String>, parser: WeightParser) -> Self {
        Self {
            language: language.into(),
            char_whitelist: char_whitelist.into(),
            parser,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Primary
    }

    async fn extract(&self, image: &DynamicImage) -> ExtractionResult {
        let png = match encode::encode_png(image) {
            Ok(png) => png,
            Err(e) => {
                warn!(error = %e, "tesseract: image encoding failed");
                return ExtractionResult::empty(EngineKind::Primary);
            }
        };

        let language = self.language.clone();
        let whitelist = self.char_whitelist.clone();
        let recognised =
            tokio::task::spawn_blocking(move || recognize_blocking(&png, &language, &whitelist))
                .await;

        let (text, confidence) = match recognised {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(error = %e, "tesseract recognition failed");
                return ExtractionResult::empty(EngineKind::Primary);
            }
            Err(e) => {
                warn!(error = %e, "tesseract task failed");
                return ExtractionResult::empty(EngineKind::Primary);
            }
        };

        let weight = self.parser.parse(&text);
        debug!(confidence, ?weight, "tesseract extraction complete");
        ExtractionResult {
            text,
            weight,
            confidence,
            engine: EngineKind::Primary,
        }
    }
}

/// Blocking recognition: returns trimmed text and normalised confidence.
fn recognize_blocking(
    png: &[u8],
    language: &str,
    whitelist: &str,
) -> Result<(String, f64), StageError> {
    let fail = |detail: String| StageError::new("tesseract", detail);

    let mut tess = LepTess::new(None, language).map_err(|e| fail(e.to_string()))?;
    tess.set_variable(Variable::TesseditCharWhitelist, whitelist)
        .map_err(|e| fail(e.to_string()))?;
    // PSM 6: assume a single uniform block of text, the usual label layout.
    tess.set_variable(Variable::TesseditPagesegMode, "6")
        .map_err(|e| fail(e.to_string()))?;
    tess.set_image_from_mem(png).map_err(|e| fail(e.to_string()))?;

    let text = tess
        .get_utf8_text()
        .map_err(|e| fail(e.to_string()))?
        .trim()
        .to_string();
    let tsv = tess.get_tsv_text(0).map_err(|e| fail(e.to_string()))?;

    Ok((text, mean_token_confidence(&tsv)))
}

/// Average of per-token confidences > 0 from Tesseract TSV output,
/// normalised to `[0, 1]`. Zero when no token is confident.
fn mean_token_confidence(tsv: &str) -> f64 {
    let confidences: Vec<f64> = tsv
        .lines()
        .filter_map(|line| line.split('\t').nth(10))
        .filter_map(|field| field.parse::<f64>().ok())
        .filter(|&conf| conf > 0.0)
        .collect();
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f64>() / confidences.len() as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two header-ish rows with conf -1 and two real tokens.
    const SAMPLE_TSV: &str = "\
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t60\t20\t91\tPESO:
5\t1\t1\t1\t1\t2\t80\t10\t70\t20\t87\t2.5
5\t1\t1\t1\t1\t3\t160\t10\t40\t20\t0\tkg";

    #[test]
    fn confidence_averages_positive_tokens_only() {
        let conf = mean_token_confidence(SAMPLE_TSV);
        assert!((conf - 0.89).abs() < 1e-9, "got {conf}");
    }

    #[test]
    fn confidence_zero_without_confident_tokens() {
        assert_eq!(mean_token_confidence(""), 0.0);
        assert_eq!(mean_token_confidence("1\t1\t0\t0\t0\t0\t0\t0\t10\t10\t-1\t"), 0.0);
    }

    #[test]
    fn confidence_ignores_malformed_rows() {
        assert_eq!(mean_token_confidence("not a tsv row at all"), 0.0);
    }
}
