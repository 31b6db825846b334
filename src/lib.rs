//! # weightlens
//!
//! Extract package weights from photographs of meat-box labels.
//!
//! The crate turns an image source — a local path, a `file://` reference, an
//! HTTP/HTTPS URL, or raw bytes — into a structured outcome carrying the
//! recognised weight in kilograms, a confidence score, and which engine
//! produced the reading.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌───────────┐
//! │ acquire │──▶│ condition │──▶│  primary  │── conf ≥ 0.7 ──▶ outcome
//! └─────────┘   └───────────┘   │ tesseract │
//!                               └─────┬─────┘
//!                                     │ low confidence
//!                               ┌─────▼─────┐   ┌───────────┐
//!                               │ secondary │──▶│ arbitrate │──▶ outcome
//!                               │  vision   │   └───────────┘
//!                               └───────────┘
//! ```
//!
//! Conditioning runs five fixed stages (contrast, brightness, rotation,
//! noise, sharpening); a stage that fails is skipped rather than aborting
//! the run. Arbitration keeps the higher-confidence result, with ties going
//! to the primary engine. Every failure mode still yields an outcome
//! (`success: false`, `engine: "error"`), never a panic or an `Err` from
//! [`process`].
//!
//! ## Quick start
//!
//! ```no_run
//! use weightlens::{process, ProcessingConfig};
//!
//! # async fn run() {
//! let config = ProcessingConfig::builder()
//!     .fallback_threshold(0.7)
//!     .weight_range(0.1, 50.0)
//!     .build()
//!     .unwrap();
//!
//! let outcome = process("label-photos/box-042.jpg", Some("REG-042"), &config).await;
//! if let Some(kg) = outcome.extracted_weight {
//!     println!("{kg} kg via {} ({:.0}%)", outcome.engine, outcome.confidence_score * 100.0);
//! }
//! # }
//! ```
//!
//! ## Engines
//!
//! | Engine | Adapter | Availability |
//! |--------|---------|--------------|
//! | Primary | Tesseract ([`engine::tesseract`]) | feature `tesseract` (links libtesseract/libleptonica) |
//! | Secondary | Google Vision ([`engine::vision`]) | always compiled; skipped without an API key |
//!
//! Either slot can instead be filled with any [`OcrEngine`] implementation
//! through [`ProcessingConfig::builder`], which is also how tests substitute
//! deterministic fakes.
//!
//! ## Logging
//!
//! Diagnostics go through [`tracing`]; install a subscriber such as
//! `tracing_subscriber::fmt()` to see them. Per-attempt business records go
//! to an optional [`ProcessingLogSink`], and a sink failure never changes
//! the outcome of the run.

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
mod process;
pub mod sink;

pub use config::{ProcessingConfig, ProcessingConfigBuilder, DEFAULT_VISION_ENDPOINT};
pub use engine::OcrEngine;
pub use error::{LogSinkError, StageError, WeightOcrError};
pub use output::{EngineKind, ExtractionResult, ProcessingLogEntry, ProcessingOutcome};
pub use parser::WeightParser;
pub use process::{process, process_bytes, process_sync};
pub use sink::ProcessingLogSink;
