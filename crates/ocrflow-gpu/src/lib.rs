//! # ocrflow-gpu
//!
//! Concrete [`ResourceGauge`](ocrflow_core::ResourceGauge) implementations
//! for the model lifecycle manager, probed in priority order:
//! **NVIDIA** (nvidia-smi) → **AMD** (rocm-smi) → **system RAM** (sysinfo).
//!
//! Detection uses filesystem probes and CLI queries rather than linking to
//! GPU libraries at compile time.
//!
//! ```rust,no_run
//! use ocrflow_core::ResourceGauge;
//!
//! let gauge = ocrflow_gpu::detect_gauge();
//! println!(
//!     "pool: {} / {} MB used",
//!     gauge.used_mb(),
//!     gauge.total_mb()
//! );
//! ```

pub mod ram;
pub mod vram;

pub use ram::SystemRamGauge;
pub use vram::{GpuVendor, VramGauge};

use ocrflow_core::ResourceGauge;
use std::sync::Arc;
use tracing::info;

/// Best available gauge for this machine: a detected GPU's VRAM, or system
/// RAM when no supported accelerator is present.
pub fn detect_gauge() -> Arc<dyn ResourceGauge> {
    match VramGauge::detect() {
        Some(gauge) => {
            info!(vendor = %gauge.vendor(), total_mb = gauge.total_mb(), "using VRAM gauge");
            Arc::new(gauge)
        }
        None => {
            info!("no supported GPU detected, using system RAM gauge");
            Arc::new(SystemRamGauge::new())
        }
    }
}
