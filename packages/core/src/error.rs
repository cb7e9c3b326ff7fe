//! Error types for the mount-and-verify sequence.

use std::io;

use sdmount_disk::{DiskError, ProbeError};

use crate::config::ConfigError;
use crate::path::PathError;

/// How bad a failure is for the device as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The device could not be probed or mounted.
    Fatal,
    /// The volume is mounted and usable, but the smoke test failed.
    Degraded,
    /// Diagnostic steps only (directory listing); never aborts a run.
    Diagnostic,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("disk error: {0}")]
    Disk(#[from] DiskError),

    #[error("failed to format volume: {source}")]
    Format {
        #[source]
        source: io::Error,
    },

    #[error("error mounting disk at {mount_point} after {attempts} attempts: {source}")]
    Mount {
        mount_point: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("error opening dir {path}: {source}")]
    DirOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create file {path}: {source}")]
    FileCreate {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open file {path} for read: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("short write to {path}: {written} of {expected} bytes")]
    ShortWrite {
        path: String,
        expected: usize,
        written: usize,
    },

    #[error("line in {path} exceeds the {capacity} byte read buffer")]
    LineTooLong { path: String, capacity: usize },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::Probe(_)
            | Error::Disk(_)
            | Error::Format { .. }
            | Error::Mount { .. }
            | Error::Path(_)
            | Error::Config(_) => Severity::Fatal,
            Error::DirOpen { .. } => Severity::Diagnostic,
            Error::FileCreate { .. }
            | Error::FileOpen { .. }
            | Error::Write { .. }
            | Error::ShortWrite { .. }
            | Error::LineTooLong { .. } => Severity::Degraded,
        }
    }

    /// Process exit code for this failure.
    ///
    /// `-1` setup, mount and read-open failures; `-2` file create failure;
    /// `-3` any other smoke-test failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::FileCreate { .. } => -2,
            Error::Write { .. } | Error::ShortWrite { .. } | Error::LineTooLong { .. } => -3,
            _ => -1,
        }
    }
}
