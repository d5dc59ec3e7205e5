//! Shared test utilities for the OCRFlow workspace.
//!
//! Provides scripted engines and fixture helpers for exercising the
//! lifecycle manager and router without real model weights or a GPU.


pub use engine::{ScriptedEngine, SlotTracker};

use ocrflow_core::{
    ManualGauge, ModelDescriptor, ModelManager, ModelRegistry, OcrEngine, PressureThresholds,
    ResourceClass,
};
use std::sync::Arc;

/// Build a manager over `(engine, class, required_mb)` triples and a
/// caller-driven gauge, with default pressure thresholds.
pub fn manager_with(
    models: &[(Arc<ScriptedEngine>, ResourceClass, u64)],
    gauge: Arc<ManualGauge>,
) -> ModelManager {
    let mut builder = ModelRegistry::builder();
    for (engine, class, required_mb) in models {
        builder = builder.register(ModelDescriptor::new(
            engine.name().to_string(),
            *class,
            *required_mb,
            ScriptedEngine::factory(engine),
        ));
    }
    ModelManager::new(
        builder.build().expect("registry build"),
        gauge,
        PressureThresholds::default(),
    )
}
