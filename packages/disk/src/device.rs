//! The block device seam.

use crate::DiskError;

/// Control requests understood by `BlockDevice::ioctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskIoctl {
    /// Number of addressable sectors.
    GetSectorCount,
    /// Size of one sector in bytes.
    GetSectorSize,
    /// Flush any cached writes to the medium. Returns 0.
    Sync,
}

/// A storage device addressed in fixed-size sectors.
///
/// Implementations must be initialized with `init` before any other call.
/// `init` is idempotent.
///
/// Sector I/O always transfers whole sectors: buffer lengths must be a
/// multiple of the sector size and `lba` is a sector index.
pub trait BlockDevice {
    /// Bring the device up. Fails if no usable medium is present.
    fn init(&mut self) -> Result<(), DiskError>;

    /// Query or control the device.
    fn ioctl(&mut self, request: DiskIoctl) -> Result<u32, DiskError>;

    /// Read `buf.len() / sector_size` sectors starting at `lba`.
    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError>;

    /// Write `data.len() / sector_size` sectors starting at `lba`.
    fn write_sectors(&mut self, lba: u64, data: &[u8]) -> Result<(), DiskError>;
}

// Blanket implementations for references and boxes

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn init(&mut self) -> Result<(), DiskError> {
        (**self).init()
    }

    fn ioctl(&mut self, request: DiskIoctl) -> Result<u32, DiskError> {
        (**self).ioctl(request)
    }

    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        (**self).read_sectors(lba, buf)
    }

    fn write_sectors(&mut self, lba: u64, data: &[u8]) -> Result<(), DiskError> {
        (**self).write_sectors(lba, data)
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for Box<T> {
    fn init(&mut self) -> Result<(), DiskError> {
        (**self).init()
    }

    fn ioctl(&mut self, request: DiskIoctl) -> Result<u32, DiskError> {
        (**self).ioctl(request)
    }

    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        (**self).read_sectors(lba, buf)
    }

    fn write_sectors(&mut self, lba: u64, data: &[u8]) -> Result<(), DiskError> {
        (**self).write_sectors(lba, data)
    }
}

/// Validate a sector transfer and return the number of sectors it spans.
pub(crate) fn check_transfer(
    lba: u64,
    len: usize,
    sector_size: u32,
    sector_count: u64,
) -> Result<u64, DiskError> {
    if len % sector_size as usize != 0 {
        return Err(DiskError::Misaligned { len, sector_size });
    }
    let sectors = (len / sector_size as usize) as u64;
    let end = lba.checked_add(sectors).unwrap_or(u64::MAX);
    if end > sector_count {
        return Err(DiskError::OutOfRange {
            lba,
            end,
            sector_count,
        });
    }
    Ok(sectors)
}

/// Validate a sector size: non-zero power of two.
pub(crate) fn check_sector_size(sector_size: u32) -> Result<(), DiskError> {
    if sector_size == 0 || !sector_size.is_power_of_two() {
        return Err(DiskError::InvalidGeometry {
            message: format!("sector size {} is not a power of two", sector_size),
        });
    }
    Ok(())
}
