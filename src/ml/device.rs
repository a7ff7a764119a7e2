//! Compute device selection for the candle models

use crate::error::{CvError, Result};
use candle_core::Device;
use log::{info, warn};

/// Forces a device: "cpu", "cuda" or "metal".
pub const DEVICE_ENV: &str = "CV_EXTRACTOR_DEVICE";

/// GPU when one is usable, CPU otherwise.
pub fn best_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA GPU");
            return device;
        }
    }

    if cfg!(target_os = "macos") {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU");
                return device;
            }
            Err(e) => warn!("Metal GPU initialization failed: {}", e),
        }
    }

    Device::Cpu
}

/// Device for the labeler: the environment override first, then the
/// `use_gpu` setting.
pub fn select_device(use_gpu: bool) -> Result<Device> {
    if let Ok(preference) = std::env::var(DEVICE_ENV) {
        match preference.to_lowercase().as_str() {
            "cpu" => return Ok(Device::Cpu),
            "cuda" => {
                return Device::new_cuda(0)
                    .map_err(|e| CvError::ModelLoad(format!("Failed to initialize CUDA: {}", e)))
            }
            "metal" => {
                return Device::new_metal(0)
                    .map_err(|e| CvError::ModelLoad(format!("Failed to initialize Metal: {}", e)))
            }
            other => warn!("Unknown device '{}' in {}, using auto-detection", other, DEVICE_ENV),
        }
    }

    if use_gpu {
        Ok(best_device())
    } else {
        Ok(Device::Cpu)
    }
}
