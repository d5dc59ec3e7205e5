//! Memory pressure classification.
//!
//! Stateless: pressure is derived fresh from the gauge on every call, with
//! no hysteresis. Rapid oscillation near a threshold is possible under
//! bursty load; none has been observed in practice yet, so no debouncing
//! is applied.

use crate::error::{OcrError, OcrResult};
use crate::gauge::ResourceGauge;
use serde::{Deserialize, Serialize};

/// How close the resource pool is to exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressureLevel::Normal => write!(f, "normal"),
            PressureLevel::Warning => write!(f, "warning"),
            PressureLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Validated warning/critical usage thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PressureThresholds {
    warning: f64,
    critical: f64,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            warning: 0.75,
            critical: 0.90,
        }
    }
}

impl PressureThresholds {
    /// Both thresholds must lie in `0..=1` with `warning < critical`.
    pub fn new(warning: f64, critical: f64) -> OcrResult<Self> {
        if !(0.0..=1.0).contains(&warning) || !(0.0..=1.0).contains(&critical) {
            return Err(OcrError::ConfigError(format!(
                "pressure thresholds must be within 0..=1, got warning={warning} critical={critical}"
            )));
        }
        if warning >= critical {
            return Err(OcrError::ConfigError(format!(
                "warning threshold {warning} must be below critical threshold {critical}"
            )));
        }
        Ok(Self { warning, critical })
    }

    pub fn warning(&self) -> f64 {
        self.warning
    }

    pub fn critical(&self) -> f64 {
        self.critical
    }

    /// Classify a usage fraction.
    pub fn evaluate(&self, usage: f64) -> PressureLevel {
        if usage >= self.critical {
            PressureLevel::Critical
        } else if usage >= self.warning {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }

    /// Classify the gauge's current reading.
    pub fn read(&self, gauge: &dyn ResourceGauge) -> PressureLevel {
        self.evaluate(gauge.usage_fraction())
    }
}
