//! Error taxonomy for model lifecycle and routing.
//!
//! The router only ever needs to answer one question about a failure: is it
//! a resource problem (degrade to a cheaper tier) or a data problem
//! (surface it immediately)? `OcrError::is_resource` encodes that split.

use thiserror::Error;

/// Errors produced by the model manager, router, and engines.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OcrError {
    /// The engine's `load()` call itself failed (e.g. OOM during
    /// initialization). Recoverable by trying the next tier.
    #[error("model load failed: {0}")]
    LoadFailure(String),

    /// Insufficient headroom in the resource pool, even after eviction.
    /// Recoverable by trying the next tier.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The loaded engine ran but failed on the given input. Not retried on
    /// a different tier — a cheaper model will not fix a malformed input.
    #[error("processing failed: {0}")]
    ProcessingFailure(String),

    /// Every tier in the list failed. The only terminal routing outcome.
    #[error("all backends failed: [{}]", attempts.join("; "))]
    AllBackendsFailed {
        /// One `"model: error"` entry per attempted tier, in order.
        attempts: Vec<String>,
    },

    /// The requested model name is not in the registry / tier list.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A waiter gave up before the model became available. The in-flight
    /// load is not cancelled and will finish on its own.
    #[error("timed out after {timeout_ms}ms waiting for model {model}")]
    AcquireTimeout { model: String, timeout_ms: u64 },

    /// Invalid configuration (thresholds, tier list, registry).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl OcrError {
    /// True for failures the router handles by degrading to the next tier.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            OcrError::LoadFailure(_) | OcrError::ResourceExhausted(_)
        )
    }
}

/// Result type used throughout the crate.
pub type OcrResult<T> = Result<T, OcrError>;
