//! FAT volumes via the `fatfs` crate.

use std::io::{self, Write};
use std::rc::Rc;

use sdmount_disk::{BlockDevice, DiskCursor, SharedDisk};
use tracing::{debug, info};

use crate::volume::{not_mounted, DirStream, FileHandle, FsKind, OpenMode, Volume};
use crate::{DirEntry, MountDescriptor, VolumePath};

type FatFs<D> = fatfs::FileSystem<DiskCursor<D>>;

struct Mounted<D: BlockDevice> {
    fs: FatFs<D>,
    mount_point: String,
}

/// A FAT volume on a shared block device.
pub struct FatVolume<D: BlockDevice> {
    disk: SharedDisk<D>,
    mounted: Option<Mounted<D>>,
}

impl<D: BlockDevice> FatVolume<D> {
    pub fn new(disk: SharedDisk<D>) -> Self {
        Self {
            disk,
            mounted: None,
        }
    }

    fn resolve(&self, path: &VolumePath) -> io::Result<(&FatFs<D>, String)> {
        let mounted = self.mounted.as_ref().ok_or_else(not_mounted)?;
        path.ensure_under(&mounted.mount_point)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
        Ok((&mounted.fs, path.relative()))
    }
}

impl<D: BlockDevice> Volume for FatVolume<D> {
    fn mount(&mut self, descriptor: &MountDescriptor) -> io::Result<()> {
        match descriptor.kind {
            FsKind::Fat => {}
        }

        if let Some(mounted) = &self.mounted {
            if mounted.mount_point == descriptor.mount_point {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("volume already mounted at {}", mounted.mount_point),
            ));
        }

        let mount_point = VolumePath::parse(&descriptor.mount_point)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if !mount_point.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("mount point {} has extra components", descriptor.mount_point),
            ));
        }

        self.disk.borrow_mut().init()?;
        let cursor = DiskCursor::new(Rc::clone(&self.disk))?;
        let fs = fatfs::FileSystem::new(cursor, fatfs::FsOptions::new().update_accessed_date(false))?;
        debug!(
            backing = %descriptor.backing,
            fat_type = ?fs.fat_type(),
            "FAT volume opened"
        );

        self.mounted = Some(Mounted {
            fs,
            mount_point: mount_point.mount_point().to_string(),
        });
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    fn open_dir<'a>(&'a self, path: &VolumePath) -> io::Result<Box<dyn DirStream + 'a>> {
        let (fs, relative) = self.resolve(path)?;
        let root = fs.root_dir();
        let dir = if relative.is_empty() {
            root
        } else {
            root.open_dir(&relative)?
        };
        Ok(Box::new(FatDirStream { iter: dir.iter() }))
    }

    fn open<'a>(
        &'a self,
        path: &VolumePath,
        mode: OpenMode,
    ) -> io::Result<Box<dyn FileHandle + 'a>> {
        let (fs, relative) = self.resolve(path)?;
        if relative.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path),
            ));
        }
        let root = fs.root_dir();
        let file = match mode {
            OpenMode::Read => root.open_file(&relative)?,
            OpenMode::CreateWrite => root.create_file(&relative)?,
        };
        Ok(Box::new(file))
    }

    fn unlink(&self, path: &VolumePath) -> io::Result<()> {
        let (fs, relative) = self.resolve(path)?;
        if relative.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot remove the volume root",
            ));
        }
        fs.root_dir().remove(&relative)
    }
}

struct FatDirStream<'a, D: BlockDevice> {
    iter: fatfs::DirIter<'a, DiskCursor<D>>,
}

impl<D: BlockDevice> DirStream for FatDirStream<'_, D> {
    fn read_next(&mut self) -> io::Result<DirEntry> {
        for entry in self.iter.by_ref() {
            let entry = entry?;
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            return Ok(if entry.is_dir() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name, entry.len())
            });
        }
        Ok(DirEntry::end())
    }
}

/// Write a fresh FAT filesystem to `disk`, sized to the whole device.
pub fn format_volume<D: BlockDevice>(disk: &SharedDisk<D>) -> io::Result<()> {
    disk.borrow_mut().init()?;
    let mut cursor = DiskCursor::new(Rc::clone(disk))?;
    let total = cursor.len();
    fatfs::format_volume(&mut cursor, fatfs::FormatVolumeOptions::new())?;
    cursor.flush()?;
    info!(bytes = total, "formatted FAT volume");
    Ok(())
}
