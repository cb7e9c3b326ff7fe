//! The mount-and-verify sequence.
//!
//! ```text
//! Unmounted --mount--> Mounted --list--> Listed --write--> WriteVerified --read--> ReadVerified
//!     |
//!     +--mount fails twice--> MountFailed
//! ```
//!
//! The mount is retried exactly once, with no backoff. Listing is diagnostic
//! and never gates the later steps. The read test only runs when enabled.

use serde::{Deserialize, Serialize};
use sdmount_disk::DeviceGeometry;
use tracing::{debug, error, info, warn};

use crate::config::SmokeConfig;
use crate::volume::Volume;
use crate::{lister, smoke, DirEntry, Error, MountDescriptor, VolumePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountState {
    Unmounted,
    Mounted,
    Listed,
    WriteVerified,
    ReadVerified,
    MountFailed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub state: MountState,
    /// Filled in by the caller that probed the device.
    pub geometry: Option<DeviceGeometry>,
    pub mount_point: String,
    pub mount_attempts: u32,
    /// `None` if the listing could not be opened.
    pub entries: Option<Vec<DirEntry>>,
    pub bytes_written: usize,
    /// `None` if the read test was disabled.
    pub lines: Option<Vec<String>>,
}

/// Drives one volume through the mount-and-verify states.
pub struct MountSequencer<V> {
    volume: V,
    descriptor: MountDescriptor,
    config: SmokeConfig,
    state: MountState,
    mount_attempts: u32,
}

impl<V: Volume> MountSequencer<V> {
    pub fn new(volume: V, descriptor: MountDescriptor, config: SmokeConfig) -> Self {
        Self {
            volume,
            descriptor,
            config,
            state: MountState::Unmounted,
            mount_attempts: 0,
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn mount_attempts(&self) -> u32 {
        self.mount_attempts
    }

    pub fn volume(&self) -> &V {
        &self.volume
    }

    /// Mount, trying one more time on failure.
    pub fn mount(&mut self) -> Result<(), Error> {
        match self.try_mount() {
            Ok(()) => return Ok(()),
            Err(e) => warn!(
                mount_point = %self.descriptor.mount_point,
                error = %e,
                "Failed to mount disk - trying one more time"
            ),
        }

        match self.try_mount() {
            Ok(()) => Ok(()),
            Err(source) => {
                self.state = MountState::MountFailed;
                error!(mount_point = %self.descriptor.mount_point, error = %source, "Error mounting disk.");
                Err(Error::Mount {
                    mount_point: self.descriptor.mount_point.clone(),
                    attempts: self.mount_attempts,
                    source,
                })
            }
        }
    }

    fn try_mount(&mut self) -> std::io::Result<()> {
        self.mount_attempts += 1;
        self.volume.mount(&self.descriptor)?;
        self.state = MountState::Mounted;
        info!(
            mount_point = %self.descriptor.mount_point,
            attempt = self.mount_attempts,
            "Disk mounted."
        );
        Ok(())
    }

    /// Run the whole sequence.
    ///
    /// A mount failure is `Severity::Fatal`; anything after a successful
    /// mount is `Severity::Degraded`.
    pub fn mount_and_verify(&mut self) -> Result<VerifyReport, Error> {
        let mount_point = VolumePath::parse(&self.descriptor.mount_point)?;
        let test_file = VolumePath::parse(&self.config.test_file)?;
        test_file.ensure_under(mount_point.mount_point())?;

        self.mount()?;

        let entries = match lister::log_listing(&self.volume, &mount_point) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(error = %e, "directory listing failed");
                None
            }
        };
        self.state = MountState::Listed;

        let bytes_written = smoke::write_test(
            &self.volume,
            &test_file,
            &self.config.content,
            self.config.short_write,
        )?;
        self.state = MountState::WriteVerified;

        let lines = if self.config.read_test {
            let lines = smoke::read_test(
                &self.volume,
                &test_file,
                self.config.line_capacity,
                self.config.byte_delay(),
            )?;
            self.state = MountState::ReadVerified;
            Some(lines)
        } else {
            debug!("read test disabled");
            None
        };

        Ok(VerifyReport {
            state: self.state,
            geometry: None,
            mount_point: self.descriptor.mount_point.clone(),
            mount_attempts: self.mount_attempts,
            entries,
            bytes_written,
            lines,
        })
    }
}
