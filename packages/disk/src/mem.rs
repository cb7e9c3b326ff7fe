//! In-memory block device.

use crate::device::{check_sector_size, check_transfer};
use crate::{BlockDevice, DiskError, DiskIoctl};

/// A block device backed by a byte vector.
///
/// Used for tests and for the self-check mode of the command line tool.
#[derive(Debug, Clone)]
pub struct MemDisk {
    data: Vec<u8>,
    sector_size: u32,
    initialized: bool,
}

impl MemDisk {
    /// Create a zero-filled disk of `sector_count` sectors.
    pub fn new(sector_count: u32, sector_size: u32) -> Self {
        Self {
            data: vec![0u8; sector_count as usize * sector_size as usize],
            sector_size,
            initialized: false,
        }
    }

    /// Wrap existing bytes, e.g. a captured card image.
    pub fn from_bytes(data: Vec<u8>, sector_size: u32) -> Self {
        Self {
            data,
            sector_size,
            initialized: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn sector_count(&self) -> u64 {
        if self.sector_size == 0 {
            return 0;
        }
        (self.data.len() / self.sector_size as usize) as u64
    }

    fn span(&self, lba: u64, len: usize) -> Result<std::ops::Range<usize>, DiskError> {
        if !self.initialized {
            return Err(DiskError::NotInitialized);
        }
        check_transfer(lba, len, self.sector_size, self.sector_count())?;
        let start = lba as usize * self.sector_size as usize;
        Ok(start..start + len)
    }
}

impl BlockDevice for MemDisk {
    fn init(&mut self) -> Result<(), DiskError> {
        check_sector_size(self.sector_size)?;
        if self.data.is_empty() {
            return Err(DiskError::NoMedia);
        }
        if self.data.len() % self.sector_size as usize != 0 {
            return Err(DiskError::InvalidGeometry {
                message: format!(
                    "{} bytes is not a whole number of {} byte sectors",
                    self.data.len(),
                    self.sector_size
                ),
            });
        }
        if u32::try_from(self.sector_count()).is_err() {
            return Err(DiskError::InvalidGeometry {
                message: format!("{} sectors exceeds 32-bit count", self.sector_count()),
            });
        }
        self.initialized = true;
        Ok(())
    }

    fn ioctl(&mut self, request: DiskIoctl) -> Result<u32, DiskError> {
        if !self.initialized {
            return Err(DiskError::NotInitialized);
        }
        match request {
            // init() guarantees the count fits
            DiskIoctl::GetSectorCount => Ok(self.sector_count() as u32),
            DiskIoctl::GetSectorSize => Ok(self.sector_size),
            DiskIoctl::Sync => Ok(0),
        }
    }

    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        let span = self.span(lba, buf.len())?;
        buf.copy_from_slice(&self.data[span]);
        Ok(())
    }

    fn write_sectors(&mut self, lba: u64, data: &[u8]) -> Result<(), DiskError> {
        let span = self.span(lba, data.len())?;
        self.data[span].copy_from_slice(data);
        Ok(())
    }
}
