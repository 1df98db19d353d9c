//! Compute device selection.

use candle_core::Device;
use tracing::{debug, info};

use crate::Result;

/// Pick the requested GPU if the build supports it, else the CPU.
pub fn select_device(cuda: Option<usize>) -> Result<Device> {
    let Some(ordinal) = cuda else {
        return Ok(Device::Cpu);
    };

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(ordinal) {
            Ok(device) => {
                info!("CUDA device {} available", ordinal);
                return Ok(device);
            }
            Err(e) => {
                debug!("CUDA not available: {}, falling back to CPU", e);
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(ordinal) {
            Ok(device) => {
                info!("Metal device {} available", ordinal);
                return Ok(device);
            }
            Err(e) => {
                debug!("Metal not available: {}, falling back to CPU", e);
            }
        }
    }

    info!("GPU {} requested but not usable in this build; using CPU", ordinal);
    debug!("Build features: cuda={} metal={}", cfg!(feature = "cuda"), cfg!(feature = "metal"));
    Ok(Device::Cpu)
}
