//! The engine capability trait and the value types that cross it.
//!
//! An `OcrEngine` is an opaque backend (DeepSeek-OCR, GOT-OCR, Surya and
//! the like). The core never looks inside one; it only drives the
//! load/unload lifecycle and reacts to whether a failure is
//! resource-related or not.

use crate::error::OcrResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Caller-supplied classification of how hard a page is to recognize.
///
/// Higher complexity maps to a higher-quality (more expensive) model tier.
/// How the signal is computed is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    /// Clean print, simple layout — the cheapest tier is fine
    Simple,
    /// Typical documents
    Standard,
    /// Dense layouts, tables, handwriting — wants the best tier
    Complex,
}

/// Opaque reference to the page payload handed to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageInput {
    /// Path to an image or PDF page on disk
    Path(PathBuf),
    /// Raw page bytes already in memory
    Bytes(Vec<u8>),
}

impl PageInput {
    pub fn path(p: impl Into<PathBuf>) -> Self {
        PageInput::Path(p.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        PageInput::Bytes(b.into())
    }
}

/// Result of a successful recognition pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Recognized text
    pub text: String,
    /// Name of the model that produced this output
    pub model: String,
    /// Engine-reported confidence in `0..=1`, if the backend provides one
    pub confidence: Option<f32>,
}

impl OcrOutput {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Capability trait implemented by each OCR backend.
///
/// Methods take `&self`; implementations use interior mutability so a
/// single instance can be shared as `Arc<dyn OcrEngine>` while the manager
/// serializes load/unload externally.
///
/// Error contract: signal a resource problem (GPU OOM and friends) with
/// `OcrError::ResourceExhausted` — the router treats anything else from
/// `process` as a data problem and will not retry on a cheaper tier.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Unique model name, matching its registry entry
    fn name(&self) -> &str;

    /// Bring the model into memory. Called at most once per lifecycle
    /// cycle; the manager guarantees no concurrent load/unload on the
    /// same engine.
    async fn load(&self) -> OcrResult<()>;

    /// Drop the model from memory, freeing its resource reservation.
    async fn unload(&self) -> OcrResult<()>;

    /// Recognize one page. Only called between a successful `load` and
    /// the next `unload`.
    async fn process(&self, input: &PageInput) -> OcrResult<OcrOutput>;
}

impl std::fmt::Debug for dyn OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine").field("name", &self.name()).finish()
    }
}
