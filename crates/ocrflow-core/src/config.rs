//! Runtime configuration for the manager and router.

use crate::error::{OcrError, OcrResult};
use crate::pressure::PressureThresholds;
use crate::registry::{ModelRegistry, ResourceClass};
use serde::{Deserialize, Serialize};

/// Configuration consumed at startup.
///
/// The tier list is ordered from highest quality/cost to lowest and must
/// end in at least one unconstrained model — the guaranteed fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Load models on first acquire (true) or eagerly at startup (false).
    /// The library never reads this itself; startup code checks it and
    /// calls [`BackendRouter::warm_up`](crate::BackendRouter::warm_up)
    /// when eager loading is wanted.
    pub lazy_loading: bool,

    /// Usage fraction at which pressure reads Warning
    pub warning_threshold: f64,

    /// Usage fraction at which pressure reads Critical
    pub critical_threshold: f64,

    /// Model names ordered best-first; the last entries are the cheap
    /// always-available fallbacks
    pub tiers: Vec<String>,

    /// Deadline for a single acquire, in seconds. None waits indefinitely.
    pub acquire_timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lazy_loading: true,
            warning_threshold: 0.75,
            critical_threshold: 0.90,
            tiers: Vec::new(),
            acquire_timeout_secs: None,
        }
    }
}

impl RuntimeConfig {
    pub fn new(tiers: Vec<String>) -> Self {
        Self {
            tiers,
            ..Default::default()
        }
    }

    /// Switch between lazy (on first acquire) and eager (at startup) loading
    pub fn with_lazy_loading(mut self, lazy: bool) -> Self {
        self.lazy_loading = lazy;
        self
    }

    /// Set both pressure thresholds
    pub fn with_thresholds(mut self, warning: f64, critical: f64) -> Result<Self, &'static str> {
        if !(0.0..=1.0).contains(&warning) || !(0.0..=1.0).contains(&critical) {
            return Err("thresholds must be within 0..=1");
        }
        if warning >= critical {
            return Err("warning threshold must be below critical threshold");
        }
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        Ok(self)
    }

    /// Set the acquire deadline
    pub fn with_acquire_timeout_secs(mut self, secs: u64) -> Result<Self, &'static str> {
        if secs == 0 {
            return Err("acquire_timeout_secs must be > 0");
        }
        self.acquire_timeout_secs = Some(secs);
        Ok(self)
    }

    /// Build the validated threshold pair.
    pub fn thresholds(&self) -> OcrResult<PressureThresholds> {
        PressureThresholds::new(self.warning_threshold, self.critical_threshold)
    }

    /// Check the tier list against the registry: non-empty, every name
    /// registered, and the final tier unconstrained so routing always has
    /// a landing spot.
    pub fn validate(&self, registry: &ModelRegistry) -> OcrResult<()> {
        self.thresholds()?;

        if self.tiers.is_empty() {
            return Err(OcrError::ConfigError("tier list is empty".to_string()));
        }
        for name in &self.tiers {
            if !registry.contains(name) {
                return Err(OcrError::ConfigError(format!(
                    "tier {name} is not a registered model"
                )));
            }
        }
        let last = &self.tiers[self.tiers.len() - 1];
        // validated above, so the lookup cannot miss
        if let Some(d) = registry.get(last) {
            if d.class() == ResourceClass::Constrained {
                return Err(OcrError::ConfigError(format!(
                    "final tier {last} must be unconstrained to guarantee a fallback"
                )));
            }
        }
        Ok(())
    }
}
