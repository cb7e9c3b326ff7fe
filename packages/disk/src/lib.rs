//! Block device layer for sdmount.
//!
//! This crate is the leaf of the workspace. It knows about sectors and
//! nothing about filesystems:
//! - `BlockDevice`: init, geometry ioctls and sector-granular I/O
//! - `probe`: initialize a device and report its `DeviceGeometry`
//! - `MemDisk` / `ImageDisk`: in-memory and image-file backings
//! - `DiskCursor`: byte-addressed `Read + Write + Seek` view over a device,
//!   which is what filesystem libraries consume
//!
//! # Example
//!
//! ```rust
//! use sdmount_disk::{probe, MemDisk};
//!
//! let mut disk = MemDisk::new(2048, 512);
//! let geometry = probe("SD", &mut disk).unwrap();
//! assert_eq!(geometry.capacity_mb(), 1);
//! ```

mod cursor;
mod device;
mod error;
mod geometry;
mod image;
mod mem;

pub use cursor::{DiskCursor, SharedDisk};
pub use device::{BlockDevice, DiskIoctl};
pub use error::{DiskError, ProbeError};
pub use geometry::{probe, DeviceGeometry};
pub use image::ImageDisk;
pub use mem::MemDisk;
