//! Pipeline stages for label-photo weight extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ acquire ──▶ condition ──▶ encode ──▶ engines
//! (path/URL)  (decode)   (5 stages)    (PNG)     (OCR)
//! ```
//!
//! 1. [`acquire`]   — resolve the path, `file://`, or HTTP source and decode
//!    it; the only stage with acquisition I/O
//! 2. [`condition`] — five-stage legibility pipeline; runs in
//!    `spawn_blocking` because the transforms are CPU-bound
//! 3. [`encode`]    — PNG-encode the conditioned bitmap for the engines

pub mod acquire;
pub mod condition;
pub mod encode;
