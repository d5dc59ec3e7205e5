//! Static model catalog.
//!
//! The registry maps a model name to its resource class, requirement, and
//! an engine factory. It is built once at startup and immutable afterwards;
//! the lifecycle manager derives its entry table from it.

use crate::engine::OcrEngine;
use crate::error::{OcrError, OcrResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Which pool a model's weights live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceClass {
    /// Lives in the constrained pool (accelerator memory). At most one
    /// such model may be loaded at any time.
    Constrained,
    /// Lives in ordinary system memory; not subject to the single-slot
    /// constraint and may be loaded concurrently with anything else.
    Unconstrained,
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceClass::Constrained => write!(f, "constrained"),
            ResourceClass::Unconstrained => write!(f, "unconstrained"),
        }
    }
}

/// Factory producing a fresh engine instance for one model.
pub type EngineFactory = Box<dyn Fn() -> Arc<dyn OcrEngine> + Send + Sync>;

/// Static metadata for one registered model.
pub struct ModelDescriptor {
    name: String,
    class: ResourceClass,
    required_mb: u64,
    factory: EngineFactory,
}

impl ModelDescriptor {
    pub fn new(
        name: impl Into<String>,
        class: ResourceClass,
        required_mb: u64,
        factory: EngineFactory,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            required_mb,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Resource requirement in MB, same unit as the gauge
    pub fn required_mb(&self) -> u64 {
        self.required_mb
    }

    /// Produce a fresh engine instance for this model.
    pub fn instantiate(&self) -> Arc<dyn OcrEngine> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("required_mb", &self.required_mb)
            .finish_non_exhaustive()
    }
}

/// Immutable name → descriptor catalog.
#[derive(Debug)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder {
            models: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered model names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Builder for [`ModelRegistry`]; rejects duplicate names at build time.
pub struct ModelRegistryBuilder {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistryBuilder {
    pub fn register(mut self, descriptor: ModelDescriptor) -> Self {
        self.models.push(descriptor);
        self
    }

    pub fn build(self) -> OcrResult<ModelRegistry> {
        let mut models = HashMap::with_capacity(self.models.len());
        for descriptor in self.models {
            let name = descriptor.name.clone();
            if models.insert(name.clone(), descriptor).is_some() {
                return Err(OcrError::ConfigError(format!(
                    "duplicate model registration: {name}"
                )));
            }
        }
        Ok(ModelRegistry { models })
    }
}
