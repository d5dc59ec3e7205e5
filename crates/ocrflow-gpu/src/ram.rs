//! System RAM fallback gauge.

use ocrflow_core::ResourceGauge;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Gauge over ordinary system memory, for machines without a supported
/// accelerator. Readings refresh from the OS on every call.
///
/// `used` is computed as total minus available (not free), so page cache
/// that the OS would reclaim for a model load does not count as pressure.
#[derive(Debug, Default)]
pub struct SystemRamGauge;

impl SystemRamGauge {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> (u64, u64) {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();
        let total_mb = sys.total_memory() / (1024 * 1024);
        let available_mb = sys.available_memory() / (1024 * 1024);
        (total_mb, available_mb)
    }
}

impl ResourceGauge for SystemRamGauge {
    fn used_mb(&self) -> u64 {
        let (total_mb, available_mb) = Self::snapshot();
        total_mb.saturating_sub(available_mb)
    }

    fn total_mb(&self) -> u64 {
        Self::snapshot().0
    }
}
