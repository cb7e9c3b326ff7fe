//! Byte-stream view over a block device.

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use crate::{BlockDevice, DiskError, DiskIoctl};

/// A device shared between the prober and the filesystem stream.
///
/// There is exactly one logical thread of control, so a `RefCell` is enough.
pub type SharedDisk<D> = Rc<RefCell<D>>;

/// `Read + Write + Seek` over an initialized `BlockDevice`.
///
/// Partial-sector writes are read-modify-write. `flush` issues
/// `DiskIoctl::Sync`.
pub struct DiskCursor<D> {
    disk: SharedDisk<D>,
    sector_size: u64,
    len: u64,
    pos: u64,
    scratch: Vec<u8>,
}

impl<D: BlockDevice> DiskCursor<D> {
    /// Create a cursor at offset 0. The device must already be initialized.
    pub fn new(disk: SharedDisk<D>) -> Result<Self, DiskError> {
        let (sector_count, sector_size) = {
            let mut device = disk.borrow_mut();
            (
                device.ioctl(DiskIoctl::GetSectorCount)?,
                device.ioctl(DiskIoctl::GetSectorSize)?,
            )
        };
        let sector_size = sector_size as u64;
        Ok(Self {
            disk,
            sector_size,
            len: sector_count as u64 * sector_size,
            pos: 0,
            scratch: vec![0u8; sector_size as usize],
        })
    }

    /// Device capacity in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl<D: BlockDevice> Read for DiskCursor<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }

        let lba = self.pos / self.sector_size;
        let offset = (self.pos % self.sector_size) as usize;
        let mut device = self.disk.borrow_mut();

        let n = if offset == 0 && want as u64 >= self.sector_size {
            let whole = want - want % self.sector_size as usize;
            device.read_sectors(lba, &mut buf[..whole])?;
            whole
        } else {
            device.read_sectors(lba, &mut self.scratch)?;
            let n = want.min(self.sector_size as usize - offset);
            buf[..n].copy_from_slice(&self.scratch[offset..offset + n]);
            n
        };

        self.pos += n as u64;
        Ok(n)
    }
}

impl<D: BlockDevice> Write for DiskCursor<D> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let want = (data.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            if data.is_empty() {
                return Ok(0);
            }
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past end of device",
            ));
        }

        let lba = self.pos / self.sector_size;
        let offset = (self.pos % self.sector_size) as usize;
        let mut device = self.disk.borrow_mut();

        let n = if offset == 0 && want as u64 >= self.sector_size {
            let whole = want - want % self.sector_size as usize;
            device.write_sectors(lba, &data[..whole])?;
            whole
        } else {
            device.read_sectors(lba, &mut self.scratch)?;
            let n = want.min(self.sector_size as usize - offset);
            self.scratch[offset..offset + n].copy_from_slice(&data[..n]);
            device.write_sectors(lba, &self.scratch)?;
            n
        };

        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.disk.borrow_mut().ioctl(DiskIoctl::Sync)?;
        Ok(())
    }
}

impl<D: BlockDevice> Seek for DiskCursor<D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing offset",
            )),
        }
    }
}
