//! # ocrflow-core
//!
//! Lifecycle management and tiered routing for heavyweight OCR models
//! sharing one constrained resource pool (accelerator memory).
//!
//! Two pieces do the real work:
//!
//! - [`ModelManager`] loads, serves, and evicts models under a
//!   single-active-constrained-model invariant, with per-model
//!   single-flight loading and safe concurrent access.
//! - [`BackendRouter`] picks a model tier per request from a complexity
//!   signal and current memory pressure, and degrades to cheaper tiers on
//!   resource failures — never on data failures.
//!
//! Everything around them (HTTP API, storage, the OCR computation itself)
//! lives elsewhere; backends plug in through the [`OcrEngine`] trait and
//! capacity readings through [`ResourceGauge`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ocrflow_core::{
//!     BackendRouter, Complexity, ManualGauge, ModelManager, ModelRegistry,
//!     PageInput, PressureThresholds, RuntimeConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ModelRegistry::builder()
//!         // .register(ModelDescriptor::new("deepseek-ocr", ...))
//!         .build()?;
//!     let gauge = Arc::new(ManualGauge::new(16_000, 0));
//!     let manager = ModelManager::new(registry, gauge, PressureThresholds::default());
//!
//!     let config = RuntimeConfig::new(vec!["surya".to_string()]);
//!     let router = BackendRouter::new(manager, &config)?;
//!     let out = router
//!         .route(&PageInput::path("/scans/p1.png"), Complexity::Standard, None)
//!         .await?;
//!     println!("{}: {}", out.model, out.text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gauge;
pub mod manager;
pub mod pressure;
pub mod registry;
pub mod router;

pub use config::RuntimeConfig;
pub use engine::{Complexity, OcrEngine, OcrOutput, PageInput};
pub use error::{OcrError, OcrResult};
pub use gauge::{ManualGauge, ResourceGauge};
pub use manager::{ManagerStats, ModelManager, ModelState};
pub use pressure::{PressureLevel, PressureThresholds};
pub use registry::{EngineFactory, ModelDescriptor, ModelRegistry, ResourceClass};
pub use router::BackendRouter;
