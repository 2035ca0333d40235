//! Compute device profile reported by the synthesis backend.

use serde::{Deserialize, Serialize};

/// Device memory at or below this many GiB gets attention slicing.
pub const LOW_MEMORY_THRESHOLD_GIB: f64 = 17.0;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cuda,
    Mps,
    Cpu,
}

/// The device a pipeline runs on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub kind: DeviceKind,
    pub total_memory_bytes: u64,
}

impl DeviceProfile {
    pub fn total_memory_gib(&self) -> f64 {
        self.total_memory_bytes as f64 / BYTES_PER_GIB
    }

    pub fn is_low_memory(&self) -> bool {
        self.total_memory_gib() <= LOW_MEMORY_THRESHOLD_GIB
    }

    /// Edge length of a square `preview` image.
    pub fn base_dimension(&self) -> u32 {
        match self.kind {
            DeviceKind::Cuda => 768,
            DeviceKind::Mps | DeviceKind::Cpu => 512,
        }
    }

    /// Largest upscale target offered to the client.
    pub fn upscaled_dimension(&self) -> u32 {
        match self.kind {
            DeviceKind::Cuda => 2048,
            DeviceKind::Mps | DeviceKind::Cpu => 968,
        }
    }

    /// Half precision weights are only used on CUDA.
    pub fn half_precision(&self) -> bool {
        self.kind == DeviceKind::Cuda
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_memory_threshold_is_inclusive() {
        let at_threshold = DeviceProfile {
            kind: DeviceKind::Cuda,
            total_memory_bytes: (17.0 * BYTES_PER_GIB) as u64,
        };
        let roomy = DeviceProfile {
            kind: DeviceKind::Cuda,
            total_memory_bytes: 24 * 1024 * 1024 * 1024,
        };
        assert!(at_threshold.is_low_memory());
        assert!(!roomy.is_low_memory());
    }

    #[test]
    fn dimensions_follow_device_kind() {
        let mps = DeviceProfile {
            kind: DeviceKind::Mps,
            total_memory_bytes: 0,
        };
        assert_eq!(mps.base_dimension(), 512);
        assert_eq!(mps.upscaled_dimension(), 968);
        assert!(!mps.half_precision());
    }
}
