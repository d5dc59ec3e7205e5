//! Accelerator memory gauges backed by vendor tooling.
//!
//! Probing uses device nodes and the vendor CLI tools rather than linking
//! GPU libraries at compile time, keeping the crate lightweight on
//! machines without an accelerator.

use ocrflow_core::ResourceGauge;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// GPU vendor whose tooling backs a [`VramGauge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    /// NVIDIA — `/dev/nvidia0` + `nvidia-smi`
    Nvidia,
    /// AMD — `/dev/kfd` + `rocm-smi`
    Amd,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "nvidia"),
            GpuVendor::Amd => write!(f, "amd"),
        }
    }
}

/// Live VRAM gauge for one GPU.
///
/// Total capacity is read once at detection; the used reading shells out
/// to the vendor CLI on every call. A failed query reports zero usage
/// rather than an error — the lifecycle manager treats the pool as roomy
/// and lets the engine's own load failure drive degradation instead.
#[derive(Debug, Clone)]
pub struct VramGauge {
    vendor: GpuVendor,
    total_mb: u64,
}

impl VramGauge {
    /// Probe for a supported GPU, NVIDIA first.
    pub fn detect() -> Option<Self> {
        if let Some(total_mb) = nvidia_total_mb() {
            debug!(total_mb, "detected NVIDIA GPU");
            return Some(Self {
                vendor: GpuVendor::Nvidia,
                total_mb,
            });
        }
        if let Some(total_mb) = amd_total_mb() {
            debug!(total_mb, "detected AMD GPU");
            return Some(Self {
                vendor: GpuVendor::Amd,
                total_mb,
            });
        }
        None
    }

    pub fn vendor(&self) -> GpuVendor {
        self.vendor
    }
}

impl ResourceGauge for VramGauge {
    fn used_mb(&self) -> u64 {
        let used = match self.vendor {
            GpuVendor::Nvidia => nvidia_used_mb(),
            GpuVendor::Amd => amd_used_mb(),
        };
        used.unwrap_or(0)
    }

    fn total_mb(&self) -> u64 {
        self.total_mb
    }
}

// ============================================================================
// NVIDIA probing
// ============================================================================

fn nvidia_total_mb() -> Option<u64> {
    if !Path::new("/dev/nvidia0").exists() {
        return None;
    }
    nvidia_smi_query("memory.total")
}

fn nvidia_used_mb() -> Option<u64> {
    nvidia_smi_query("memory.used")
}

/// Run `nvidia-smi --query-gpu=<field>` and parse the first GPU's value.
/// nvidia-smi reports MiB with `nounits`.
fn nvidia_smi_query(field: &str) -> Option<u64> {
    let output = Command::new("nvidia-smi")
        .args([
            &format!("--query-gpu={field}"),
            "--format=csv,noheader,nounits",
        ])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.trim().lines().next()?.trim().parse().ok()
}

// ============================================================================
// AMD probing
// ============================================================================

fn amd_total_mb() -> Option<u64> {
    if !Path::new("/dev/kfd").exists() {
        return None;
    }
    amd_vram_column(1)
}

fn amd_used_mb() -> Option<u64> {
    amd_vram_column(2)
}

/// Parse a column out of `rocm-smi --showmeminfo vram --csv`.
/// CSV layout: `GPU,VRAM Total Memory (B),VRAM Used Memory (B)` — values
/// are bytes.
fn amd_vram_column(column: usize) -> Option<u64> {
    let output = Command::new("rocm-smi")
        .args(["--showmeminfo", "vram", "--csv"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() > column {
            if let Ok(bytes) = parts[column].trim().parse::<u64>() {
                return Some(bytes / (1024 * 1024));
            }
        }
    }
    None
}
