//! Device capability detection and backend selection
//!
//! The accelerated backend is recommended only when all of these hold:
//! the platform has an accelerated path at all, the hardware feature that
//! path needs is present, and total device memory meets the threshold
//! (6 GB by default). Anything undetectable counts as absent, so the
//! answer degrades to CPU rather than failing.
//!
//! Capabilities are computed once per probe and cached for the process
//! lifetime.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Default memory floor for the accelerated backend (6 GB)
pub const DEFAULT_ACCELERATED_MIN_MEMORY_MB: u64 = 6 * 1024;

/// Compute backend used to run the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// CPU-only, always available
    Cpu,
    /// Accelerated path (GPU / NPU delegate)
    Gpu,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Cpu => write!(f, "CPU"),
            Backend::Gpu => write!(f, "GPU"),
        }
    }
}

/// Capabilities of the device the process runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub accelerated_backend_available: bool,
    pub total_memory_mb: u64,
    pub platform_id: String,
}

impl DeviceCapabilities {
    /// CPU-only answer used when nothing can be detected.
    pub fn conservative(platform_id: impl Into<String>) -> Self {
        Self {
            accelerated_backend_available: false,
            total_memory_mb: 0,
            platform_id: platform_id.into(),
        }
    }

    /// Backend to use when the caller has no preference.
    ///
    /// The memory floor is re-checked here so that a capability record built
    /// by the host (rather than by the probe) cannot select GPU on a device
    /// that is too small for it.
    pub fn recommended_backend(&self, min_memory_mb: u64) -> Backend {
        if self.accelerated_backend_available && self.total_memory_mb >= min_memory_mb {
            Backend::Gpu
        } else {
            Backend::Cpu
        }
    }
}

/// Raw hardware facts consulted by [`DeviceCapabilityProbe`].
///
/// Hosts with platform APIs (Metal, NNAPI, ...) supply their own source;
/// [`SystemHardwareSource`] covers desktop and Linux-like targets.
pub trait HardwareSource: Send + Sync {
    fn platform_id(&self) -> String;

    /// The platform has an accelerated inference path at all.
    fn supports_accelerated_path(&self) -> bool;

    /// The specific hardware feature the accelerated path needs is present.
    fn has_accelerator_feature(&self) -> bool;

    /// Total device memory, `None` when it cannot be determined.
    fn total_memory_mb(&self) -> Option<u64>;
}

/// Hardware facts known up front (host-provided or in tests)
#[derive(Debug, Clone)]
pub struct StaticHardwareSource {
    pub platform_id: String,
    pub accelerated_path: bool,
    pub accelerator_feature: bool,
    pub total_memory_mb: Option<u64>,
}

impl HardwareSource for StaticHardwareSource {
    fn platform_id(&self) -> String {
        self.platform_id.clone()
    }

    fn supports_accelerated_path(&self) -> bool {
        self.accelerated_path
    }

    fn has_accelerator_feature(&self) -> bool {
        self.accelerator_feature
    }

    fn total_memory_mb(&self) -> Option<u64> {
        self.total_memory_mb
    }
}

/// Detects capabilities of the machine the process runs on.
///
/// Detection uses filesystem probes and process checks rather than linking
/// to GPU libraries. The first probe may spawn processes, so call it from a
/// blocking context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHardwareSource;

impl HardwareSource for SystemHardwareSource {
    fn platform_id(&self) -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }

    fn supports_accelerated_path(&self) -> bool {
        matches!(
            std::env::consts::OS,
            "macos" | "ios" | "android" | "linux" | "windows"
        )
    }

    fn has_accelerator_feature(&self) -> bool {
        // Metal is present on every Apple Silicon device
        if matches!(std::env::consts::OS, "macos" | "ios") && std::env::consts::ARCH == "aarch64"
        {
            return true;
        }
        detect_render_node() || detect_nvidia()
    }

    fn total_memory_mb(&self) -> Option<u64> {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();
        match sys.total_memory() {
            0 => None,
            bytes => Some(bytes / (1024 * 1024)),
        }
    }
}

/// DRM render node, present for any GPU usable through Vulkan/OpenCL.
fn detect_render_node() -> bool {
    Path::new("/dev/dri/renderD128").exists()
}

fn detect_nvidia() -> bool {
    if !Path::new("/dev/nvidia0").exists() {
        return false;
    }
    std::process::Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .map(|o| o.status.success() && !o.stdout.is_empty())
        .unwrap_or(false)
}

/// Answers "can this device use the accelerated backend, and how much
/// memory does it have?"
pub struct DeviceCapabilityProbe {
    source: Box<dyn HardwareSource>,
    min_memory_mb: u64,
    cache: OnceCell<DeviceCapabilities>,
}

impl std::fmt::Debug for DeviceCapabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapabilityProbe")
            .field("min_memory_mb", &self.min_memory_mb)
            .field("cached", &self.cache.get())
            .finish()
    }
}

impl Default for DeviceCapabilityProbe {
    fn default() -> Self {
        Self::new(Box::new(SystemHardwareSource))
    }
}

impl DeviceCapabilityProbe {
    pub fn new(source: Box<dyn HardwareSource>) -> Self {
        Self {
            source,
            min_memory_mb: DEFAULT_ACCELERATED_MIN_MEMORY_MB,
            cache: OnceCell::new(),
        }
    }

    /// Probe with a fixed capability record; no detection ever runs.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        let probe = Self::new(Box::new(StaticHardwareSource {
            platform_id: capabilities.platform_id.clone(),
            accelerated_path: capabilities.accelerated_backend_available,
            accelerator_feature: capabilities.accelerated_backend_available,
            total_memory_mb: Some(capabilities.total_memory_mb),
        }));
        let _ = probe.cache.set(capabilities);
        probe
    }

    pub fn with_min_memory_mb(mut self, min_memory_mb: u64) -> Self {
        self.min_memory_mb = min_memory_mb;
        self
    }

    pub fn min_memory_mb(&self) -> u64 {
        self.min_memory_mb
    }

    /// Detect (once) and return the device capabilities.
    pub fn probe(&self) -> DeviceCapabilities {
        self.cache.get_or_init(|| self.detect()).clone()
    }

    /// Backend recommended by the cached capabilities.
    pub fn recommended_backend(&self) -> Backend {
        self.probe().recommended_backend(self.min_memory_mb)
    }

    fn detect(&self) -> DeviceCapabilities {
        let platform_id = self.source.platform_id();
        let Some(total_memory_mb) = self.source.total_memory_mb() else {
            tracing::warn!(platform = %platform_id, "device memory undetectable, assuming CPU only");
            return DeviceCapabilities::conservative(platform_id);
        };

        let accelerated_backend_available = self.source.supports_accelerated_path()
            && self.source.has_accelerator_feature()
            && total_memory_mb >= self.min_memory_mb;

        tracing::info!(
            platform = %platform_id,
            total_memory_mb,
            accelerated = accelerated_backend_available,
            "device capabilities detected"
        );

        DeviceCapabilities {
            accelerated_backend_available,
            total_memory_mb,
            platform_id,
        }
    }
}
