//! Error types for the disk layer.

use std::io;

use crate::device::DiskIoctl;

/// Errors raised by a `BlockDevice`.
#[derive(thiserror::Error, Debug)]
pub enum DiskError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("device not initialized")]
    NotInitialized,

    #[error("no media present")]
    NoMedia,

    #[error("invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("sectors {lba}..{end} out of range (device has {sector_count} sectors)")]
    OutOfRange {
        lba: u64,
        end: u64,
        sector_count: u64,
    },

    #[error("buffer length {len} is not a multiple of sector size {sector_size}")]
    Misaligned { len: usize, sector_size: u32 },

    #[error("ioctl {0:?} not supported")]
    UnsupportedIoctl(DiskIoctl),
}

impl From<DiskError> for io::Error {
    fn from(error: DiskError) -> Self {
        match error {
            DiskError::Io(e) => e,
            DiskError::NoMedia => io::Error::new(io::ErrorKind::NotFound, error),
            DiskError::OutOfRange { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, error),
            DiskError::Misaligned { .. } => io::Error::new(io::ErrorKind::InvalidInput, error),
            other => io::Error::other(other),
        }
    }
}

/// Errors raised while probing a device before it is mounted.
///
/// Every variant is fatal to the startup sequence; there is no retry at
/// this layer.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("storage init failed for {device}: {source}")]
    DeviceInit {
        device: String,
        #[source]
        source: DiskError,
    },

    #[error("unable to get {what} for {device}: {source}")]
    GeometryQuery {
        device: String,
        what: &'static str,
        #[source]
        source: DiskError,
    },
}
