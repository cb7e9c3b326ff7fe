//! Block device backed by a disk image file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::device::{check_sector_size, check_transfer};
use crate::{BlockDevice, DiskError, DiskIoctl};

/// A raw image of a removable card, e.g. the output of `dd if=/dev/mmcblk0`.
///
/// The file is opened read/write by `init`, not by the constructor, so a
/// missing image surfaces as a device init failure.
#[derive(Debug)]
pub struct ImageDisk {
    path: PathBuf,
    sector_size: u32,
    file: Option<File>,
    sector_count: u64,
}

impl ImageDisk {
    pub fn open(path: impl Into<PathBuf>, sector_size: u32) -> Self {
        Self {
            path: path.into(),
            sector_size,
            file: None,
            sector_count: 0,
        }
    }

    /// Create (or resize) a zero-filled image of `sector_count` sectors.
    pub fn create(
        path: impl Into<PathBuf>,
        sector_count: u32,
        sector_size: u32,
    ) -> Result<Self, DiskError> {
        check_sector_size(sector_size)?;
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(sector_count as u64 * sector_size as u64)?;
        tracing::debug!(path = %path.display(), sector_count, sector_size, "created disk image");
        Ok(Self::open(path, sector_size))
    }

    fn file_at(&mut self, lba: u64, len: usize) -> Result<&mut File, DiskError> {
        let sector_size = self.sector_size;
        let sector_count = self.sector_count;
        let file = self.file.as_mut().ok_or(DiskError::NotInitialized)?;
        check_transfer(lba, len, sector_size, sector_count)?;
        file.seek(SeekFrom::Start(lba * sector_size as u64))?;
        Ok(file)
    }
}

impl BlockDevice for ImageDisk {
    fn init(&mut self) -> Result<(), DiskError> {
        if self.file.is_some() {
            return Ok(());
        }
        check_sector_size(self.sector_size)?;

        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(DiskError::NoMedia),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len == 0 {
            return Err(DiskError::NoMedia);
        }
        if len % self.sector_size as u64 != 0 {
            return Err(DiskError::InvalidGeometry {
                message: format!(
                    "{} is {} bytes, not a whole number of {} byte sectors",
                    self.path.display(),
                    len,
                    self.sector_size
                ),
            });
        }
        let sector_count = len / self.sector_size as u64;
        if u32::try_from(sector_count).is_err() {
            return Err(DiskError::InvalidGeometry {
                message: format!("{} sectors exceeds 32-bit count", sector_count),
            });
        }

        self.sector_count = sector_count;
        self.file = Some(file);
        Ok(())
    }

    fn ioctl(&mut self, request: DiskIoctl) -> Result<u32, DiskError> {
        let file = self.file.as_mut().ok_or(DiskError::NotInitialized)?;
        match request {
            DiskIoctl::GetSectorCount => Ok(self.sector_count as u32),
            DiskIoctl::GetSectorSize => Ok(self.sector_size),
            DiskIoctl::Sync => {
                file.sync_data()?;
                Ok(0)
            }
        }
    }

    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        self.file_at(lba, buf.len())?.read_exact(buf)?;
        Ok(())
    }

    fn write_sectors(&mut self, lba: u64, data: &[u8]) -> Result<(), DiskError> {
        self.file_at(lba, data.len())?.write_all(data)?;
        Ok(())
    }
}
