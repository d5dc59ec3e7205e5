//! Resource pool capacity reporting.
//!
//! A gauge reads the environment; it has no state of its own beyond that.
//! Units are megabytes everywhere, matching `ModelDescriptor::required_mb`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Reports current and total capacity of the constrained resource pool
/// (typically accelerator memory).
pub trait ResourceGauge: Send + Sync {
    /// Capacity currently in use, in MB
    fn used_mb(&self) -> u64;

    /// Total pool capacity, in MB
    fn total_mb(&self) -> u64;

    /// Headroom estimate, in MB
    fn available_mb(&self) -> u64 {
        self.total_mb().saturating_sub(self.used_mb())
    }

    /// Usage as a fraction in `0..=1`; 0.0 for a zero-capacity pool
    fn usage_fraction(&self) -> f64 {
        let total = self.total_mb();
        if total == 0 {
            return 0.0;
        }
        self.used_mb() as f64 / total as f64
    }
}

/// A fixed-capacity gauge whose used value is driven by the caller.
///
/// Used in tests and simulations where no real accelerator is present.
#[derive(Debug)]
pub struct ManualGauge {
    total_mb: u64,
    used_mb: AtomicU64,
}

impl ManualGauge {
    pub fn new(total_mb: u64, used_mb: u64) -> Self {
        Self {
            total_mb,
            used_mb: AtomicU64::new(used_mb),
        }
    }

    /// Overwrite the reported used capacity.
    pub fn set_used_mb(&self, used_mb: u64) {
        self.used_mb.store(used_mb, Ordering::SeqCst);
    }
}

impl ResourceGauge for ManualGauge {
    fn used_mb(&self) -> u64 {
        self.used_mb.load(Ordering::SeqCst)
    }

    fn total_mb(&self) -> u64 {
        self.total_mb
    }
}
