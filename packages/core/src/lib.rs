//! sdmount core: mount a FAT volume and prove it works.
//!
//! The sequence, in order:
//! - probe the block device (`sdmount_disk::probe`), informational only
//! - mount at the configured mount point, retrying exactly once
//! - list the root directory, logging each entry
//! - write a one-line test file
//! - optionally read it back through a bounded line buffer
//!
//! Filesystem access goes through the `Volume` trait. `FatVolume` implements
//! it with the `fatfs` crate over any `BlockDevice`.
//!
//! # Example
//!
//! ```rust
//! use sdmount_core::{fat, run_shared, MountState, SmokeConfig};
//! use sdmount_disk::MemDisk;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let disk = Rc::new(RefCell::new(MemDisk::new(8192, 512)));
//! fat::format_volume(&disk).unwrap();
//!
//! let report = run_shared(&SmokeConfig::default(), disk).unwrap();
//! assert_eq!(report.state, MountState::ReadVerified);
//! assert_eq!(report.lines, Some(vec!["hello world!".to_string()]));
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use sdmount_disk::{probe, BlockDevice, SharedDisk};

pub mod config;
mod error;
pub mod fat;
pub mod lister;
mod mount;
mod path;
pub mod smoke;
mod volume;

pub use config::{ConfigError, SmokeConfig};
pub use error::{Error, Severity};
pub use fat::FatVolume;
pub use mount::{MountSequencer, MountState, VerifyReport};
pub use path::{PathError, VolumePath};
pub use smoke::{LineReader, ShortWritePolicy};
pub use volume::{
    DirEntry, DirStream, EntryKind, FileHandle, FsKind, MountDescriptor, OpenMode, Volume,
};

/// Probe, mount and verify a device that is not shared with the caller.
pub fn run<D: BlockDevice>(config: &SmokeConfig, device: D) -> Result<VerifyReport, Error> {
    run_shared(config, Rc::new(RefCell::new(device)))
}

/// Probe, mount and verify a device the caller keeps a handle to.
pub fn run_shared<D: BlockDevice>(
    config: &SmokeConfig,
    disk: SharedDisk<D>,
) -> Result<VerifyReport, Error> {
    config.validate()?;

    let geometry = probe(&config.device_id, &mut *disk.borrow_mut())?;

    let volume = FatVolume::new(disk);
    let mut sequencer = MountSequencer::new(volume, config.descriptor(), config.clone());
    let mut report = sequencer.mount_and_verify()?;
    report.geometry = Some(geometry);
    Ok(report)
}
