//! Configuration for the weight-extraction pipeline.
//!
//! All behaviour is controlled through [`ProcessingConfig`], built via its
//! [`ProcessingConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across invocations and to diff two runs to
//! understand why their outcomes differ.
//!
//! Two values that look like constants are deliberately configuration: the
//! 0.7 fallback threshold and the 0.1–50.0 kg plausible range are domain
//! assumptions about meat-box labels, and the secondary engine's 0.85
//! confidence is a simplification (the remote service reports no granular
//! confidence), not a measurement.

use crate::engine::OcrEngine;
use crate::error::WeightOcrError;
use crate::parser::WeightParser;
use crate::sink::ProcessingLogSink;
use std::fmt;
use std::sync::Arc;

/// Default endpoint of the remote text-detection service.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Configuration for one or more pipeline runs.
///
/// Built via [`ProcessingConfig::builder()`] or [`ProcessingConfig::default()`].
///
/// # Example
/// ```rust
/// use weightlens::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .fallback_threshold(0.75)
///     .weight_range(0.5, 30.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Primary-engine confidence below which the secondary engine is tried.
    /// Range: 0.0–1.0. Default: 0.7.
    ///
    /// At 0.7 the local engine handles clean labels alone (one engine call,
    /// well inside the ~2 s budget) while blurry or skewed photos still get
    /// the remote second opinion.
    pub fallback_threshold: f64,

    /// Fixed confidence assigned to successful secondary-engine results.
    /// Default: 0.85.
    ///
    /// The remote service exposes no per-token confidence, so a successful
    /// detection is given this flat score for arbitration purposes.
    pub secondary_confidence: f64,

    /// Lower bound of the plausible weight range, in kilograms. Default: 0.1.
    pub min_weight_kg: f64,

    /// Upper bound of the plausible weight range, in kilograms. Default: 50.0.
    pub max_weight_kg: f64,

    /// Timeout for fetching a remote image source, in seconds. Default: 10.
    ///
    /// Bounded so an unreachable CDN cannot block an invocation
    /// indefinitely; the pipeline itself has no internal deadline.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the remote text-detection API, in seconds.
    /// Default: 10.
    pub api_timeout_secs: u64,

    /// Tesseract language spec. Default: `"spa+eng"`.
    ///
    /// Labels carry Spanish (`PESO`) and English (`WEIGHT`/`NET WT`)
    /// wording; combined recognition covers both without a second pass.
    pub ocr_language: String,

    /// Tesseract character whitelist. Default: `"0123456789.,KkGg"`.
    ///
    /// Restricting recognition to digits, separators, and weight-unit
    /// letters suppresses the alphabetic noise a full-page model would
    /// produce on dense label text.
    pub char_whitelist: String,

    /// API key for the remote text-detection service. If `None`, the
    /// `GOOGLE_VISION_API_KEY` environment variable is consulted; if that is
    /// also absent the secondary engine reports the empty result without
    /// touching the network.
    pub vision_api_key: Option<String>,

    /// Endpoint of the remote text-detection service. Overridable for tests.
    pub vision_endpoint: String,

    /// Pre-constructed primary engine. Takes precedence over the built-in
    /// Tesseract engine (feature `tesseract`).
    pub primary_engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed secondary engine. Takes precedence over the built-in
    /// remote-vision engine.
    pub secondary_engine: Option<Arc<dyn OcrEngine>>,

    /// Storage for per-attempt processing logs. `None` disables logging.
    pub log_sink: Option<Arc<dyn ProcessingLogSink>>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.7,
            secondary_confidence: 0.85,
            min_weight_kg: 0.1,
            max_weight_kg: 50.0,
            download_timeout_secs: 10,
            api_timeout_secs: 10,
            ocr_language: "spa+eng".to_string(),
            char_whitelist: "0123456789.,KkGg".to_string(),
            vision_api_key: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            primary_engine: None,
            secondary_engine: None,
            log_sink: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("fallback_threshold", &self.fallback_threshold)
            .field("secondary_confidence", &self.secondary_confidence)
            .field("min_weight_kg", &self.min_weight_kg)
            .field("max_weight_kg", &self.max_weight_kg)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_language", &self.ocr_language)
            .field("char_whitelist", &self.char_whitelist)
            .field("vision_api_key", &self.vision_api_key.as_ref().map(|_| "<redacted>"))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("primary_engine", &self.primary_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("secondary_engine", &self.secondary_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("log_sink", &self.log_sink.as_ref().map(|_| "<dyn ProcessingLogSink>"))
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The weight parser for this configuration's plausible range.
    pub fn parser(&self) -> WeightParser {
        WeightParser::new(self.min_weight_kg, self.max_weight_kg)
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn fallback_threshold(mut self, t: f64) -> Self {
        self.config.fallback_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn secondary_confidence(mut self, c: f64) -> Self {
        self.config.secondary_confidence = c.clamp(0.0, 1.0);
        self
    }

    pub fn weight_range(mut self, min_kg: f64, max_kg: f64) -> Self {
        self.config.min_weight_kg = min_kg;
        self.config.max_weight_kg = max_kg;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn char_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.config.char_whitelist = whitelist.into();
        self
    }

    pub fn vision_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.vision_api_key = Some(key.into());
        self
    }

    pub fn vision_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.vision_endpoint = endpoint.into();
        self
    }

    pub fn primary_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.primary_engine = Some(engine);
        self
    }

    pub fn secondary_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.secondary_engine = Some(engine);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn ProcessingLogSink>) -> Self {
        self.config.log_sink = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, WeightOcrError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.fallback_threshold) {
            return Err(WeightOcrError::InvalidConfig(format!(
                "fallback threshold must be 0.0–1.0, got {}",
                c.fallback_threshold
            )));
        }
        if c.min_weight_kg <= 0.0 || c.min_weight_kg >= c.max_weight_kg {
            return Err(WeightOcrError::InvalidConfig(format!(
                "weight range must satisfy 0 < min < max, got {}–{}",
                c.min_weight_kg, c.max_weight_kg
            )));
        }
        if c.ocr_language.is_empty() {
            return Err(WeightOcrError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_domain_assumptions() {
        let c = ProcessingConfig::default();
        assert_eq!(c.fallback_threshold, 0.7);
        assert_eq!(c.secondary_confidence, 0.85);
        assert_eq!(c.min_weight_kg, 0.1);
        assert_eq!(c.max_weight_kg, 50.0);
        assert_eq!(c.download_timeout_secs, 10);
        assert_eq!(c.ocr_language, "spa+eng");
    }

    #[test]
    fn threshold_is_clamped() {
        let c = ProcessingConfig::builder()
            .fallback_threshold(1.8)
            .build()
            .unwrap();
        assert_eq!(c.fallback_threshold, 1.0);
    }

    #[test]
    fn inverted_weight_range_rejected() {
        let err = ProcessingConfig::builder()
            .weight_range(50.0, 0.1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("weight range"));
    }

    #[test]
    fn zero_min_weight_rejected() {
        assert!(ProcessingConfig::builder()
            .weight_range(0.0, 10.0)
            .build()
            .is_err());
    }

    #[test]
    fn parser_uses_configured_range() {
        let c = ProcessingConfig::builder()
            .weight_range(1.0, 5.0)
            .build()
            .unwrap();
        assert_eq!(c.parser().parse("7 kg 3 kg"), Some(3.0));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ProcessingConfig::builder()
            .vision_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("redacted"));
    }
}
