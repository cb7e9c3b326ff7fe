//! Device geometry probing.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{BlockDevice, DiskIoctl, ProbeError};

/// Sector count and size reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub sector_count: u32,
    pub sector_size: u32,
}

impl DeviceGeometry {
    /// Total capacity in bytes. Widened to 64 bits before multiplying.
    pub fn capacity_bytes(&self) -> u64 {
        self.sector_count as u64 * self.sector_size as u64
    }

    /// Capacity in whole mebibytes, truncated to 32 bits only at the end.
    pub fn capacity_mb(&self) -> u32 {
        (self.capacity_bytes() >> 20) as u32
    }
}

/// Initialize `device` and report its geometry.
///
/// The result is informational; callers do not gate mounting on it. Any
/// failure is fatal to the startup sequence and is not retried.
pub fn probe<D: BlockDevice + ?Sized>(
    device_id: &str,
    device: &mut D,
) -> Result<DeviceGeometry, ProbeError> {
    device.init().map_err(|source| {
        error!(device = %device_id, error = %source, "storage init ERROR!");
        ProbeError::DeviceInit {
            device: device_id.to_string(),
            source,
        }
    })?;

    let sector_count = query(device_id, device, DiskIoctl::GetSectorCount, "sector count")?;
    info!(device = %device_id, "Block count {}", sector_count);

    let sector_size = query(device_id, device, DiskIoctl::GetSectorSize, "sector size")?;
    info!(device = %device_id, "Sector size {}", sector_size);

    let geometry = DeviceGeometry {
        sector_count,
        sector_size,
    };
    info!(device = %device_id, "Memory Size(MB) {}", geometry.capacity_mb());
    Ok(geometry)
}

fn query<D: BlockDevice + ?Sized>(
    device_id: &str,
    device: &mut D,
    request: DiskIoctl,
    what: &'static str,
) -> Result<u32, ProbeError> {
    device.ioctl(request).map_err(|source| {
        error!(device = %device_id, error = %source, "unable to get {}", what);
        ProbeError::GeometryQuery {
            device: device_id.to_string(),
            what,
            source,
        }
    })
}
