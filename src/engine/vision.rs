//! Secondary engine: remote text detection via the Google Vision REST API.
//!
//! ## Degradation contract
//!
//! The remote engine is the fallback of last resort, so it must never make
//! things worse: no API key → skip the network call entirely and report the
//! empty result; HTTP or service-level error → empty result; no text found
//! → empty result. The orchestrator treats all three identically.
//!
//! ## Confidence
//!
//! The service reports no granular confidence for full-image text
//! detection, so a successful detection is assigned a flat, configurable
//! score (default 0.85). This is a deliberate simplification for
//! arbitration purposes, not a measurement.

use crate::engine::OcrEngine;
use crate::output::{EngineKind, ExtractionResult};
use crate::parser::WeightParser;
use crate::pipeline::encode;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Remote/cloud OCR adapter.
pub struct GoogleVisionEngine {
    /// `None` means the client is unavailable; extraction short-circuits.
    api_key: Option<String>,
    endpoint: String,
    fixed_confidence: f64,
    timeout: Duration,
    parser: WeightParser,
    client: reqwest::Client,
}

impl GoogleVisionEngine {
    pub fn new(
        api_key: Option<String>,
        endpoint: impl Into<String>,
        fixed_confidence: f64,
        timeout_secs: u64,
        parser: WeightParser,
    ) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into(),
            fixed_confidence,
            timeout: Duration::from_secs(timeout_secs),
            parser,
            client: reqwest::Client::new(),
        }
    }

    /// Whether a key is configured and the engine will attempt network calls.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn annotate(&self, key: &str, png: &[u8]) -> Result<AnnotateResponse, String> {
        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(png),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                    max_results: 1,
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key)])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        response.json().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Secondary
    }

    async fn extract(&self, image: &DynamicImage) -> ExtractionResult {
        let Some(key) = self.api_key.clone() else {
            warn!("vision client not configured, skipping remote extraction");
            return ExtractionResult::empty(EngineKind::Secondary);
        };

        let png = match encode::encode_png(image) {
            Ok(png) => png,
            Err(e) => {
                warn!(error = %e, "vision: image encoding failed");
                return ExtractionResult::empty(EngineKind::Secondary);
            }
        };

        let annotated = match self.annotate(&key, &png).await {
            Ok(annotated) => annotated,
            Err(e) => {
                warn!(error = %e, "vision text detection failed");
                return ExtractionResult::empty(EngineKind::Secondary);
            }
        };

        let Some(first) = annotated.responses.into_iter().next() else {
            return ExtractionResult::empty(EngineKind::Secondary);
        };
        if let Some(err) = first.error {
            // A service-reported error is a failure like any other.
            warn!(error = %err.message, "vision service reported an error");
            return ExtractionResult::empty(EngineKind::Secondary);
        }

        // The first annotation covers the whole image; later ones are
        // per-word fragments.
        let Some(annotation) = first.text_annotations.and_then(|mut t| {
            if t.is_empty() {
                None
            } else {
                Some(t.swap_remove(0))
            }
        }) else {
            debug!("vision detected no text");
            return ExtractionResult::empty(EngineKind::Secondary);
        };

        let text = annotation.description.trim().to_string();
        let weight = self.parser.parse(&text);
        debug!(confidence = self.fixed_confidence, ?weight, "vision extraction complete");
        ExtractionResult {
            text,
            weight,
            confidence: self.fixed_confidence,
            engine: EngineKind::Secondary,
        }
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "maxResults")]
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<TextDetectionResponse>,
}

#[derive(Deserialize)]
struct TextDetectionResponse {
    #[serde(rename = "textAnnotations")]
    text_annotations: Option<Vec<TextAnnotation>>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    description: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn engine_without_key() -> GoogleVisionEngine {
        GoogleVisionEngine::new(
            None,
            crate::config::DEFAULT_VISION_ENDPOINT,
            0.85,
            10,
            WeightParser::default(),
        )
    }

    #[tokio::test]
    async fn missing_key_returns_empty_without_network() {
        let engine = engine_without_key();
        assert!(!engine.is_available());
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let result = engine.extract(&img).await;
        assert!(result.text.is_empty());
        assert!(result.weight.is_none());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.engine, EngineKind::Secondary);
    }

    #[test]
    fn response_parsing_reads_first_annotation() {
        let json = r#"{
            "responses": [{
                "textAnnotations": [
                    {"description": "PESO: 3.2 kg\n"},
                    {"description": "PESO:"}
                ]
            }]
        }"#;
        let parsed: AnnotateResponse = serde_json::from_str(json).unwrap();
        let first = parsed.responses.into_iter().next().unwrap();
        assert!(first.error.is_none());
        let annotations = first.text_annotations.unwrap();
        assert_eq!(annotations[0].description, "PESO: 3.2 kg\n");
    }

    #[test]
    fn response_parsing_surfaces_service_error() {
        let json = r#"{"responses": [{"error": {"message": "quota exceeded"}}]}"#;
        let parsed: AnnotateResponse = serde_json::from_str(json).unwrap();
        let first = parsed.responses.into_iter().next().unwrap();
        assert_eq!(first.error.unwrap().message, "quota exceeded");
    }

    #[test]
    fn request_body_uses_vision_wire_names() {
        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: "aGVsbG8=".into(),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                    max_results: 1,
                }],
            }],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"type\":\"TEXT_DETECTION\""));
        assert!(json.contains("\"maxResults\":1"));
    }
}
