//! Smoke-test configuration.
//!
//! Layered lowest to highest: built-in defaults, a JSON file, environment
//! variables, then whatever the caller sets explicitly.
//!
//! ```json
//! {"mount_point": "/SD:", "test_file": "/SD:/test_data.txt", "read_test": true}
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::smoke::ShortWritePolicy;
use crate::volume::{FsKind, MountDescriptor};
use crate::VolumePath;

pub const DEFAULT_DEVICE_ID: &str = "SD";
pub const DEFAULT_MOUNT_POINT: &str = "/SD:";
pub const DEFAULT_TEST_FILE: &str = "/SD:/test_data.txt";
pub const DEFAULT_CONTENT: &str = "hello world!";
pub const DEFAULT_LINE_CAPACITY: usize = 200;

pub const ENV_READ_TEST: &str = "SDMOUNT_READ_TEST";
pub const ENV_MOUNT_POINT: &str = "SDMOUNT_MOUNT_POINT";
pub const ENV_TEST_FILE: &str = "SDMOUNT_TEST_FILE";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {var}")]
    Env { var: &'static str, value: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeConfig {
    /// Name of the block device to probe and mount.
    pub device_id: String,
    pub mount_point: String,
    pub test_file: String,
    /// Line written by the write test; a newline is appended.
    pub content: String,
    /// Read buffer size in bytes, newline included.
    pub line_capacity: usize,
    /// Run the read-back test after the write test.
    pub read_test: bool,
    pub short_write: ShortWritePolicy,
    /// Pause after every byte read. Zero disables it.
    pub byte_delay_ms: u64,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID.to_string(),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            test_file: DEFAULT_TEST_FILE.to_string(),
            content: DEFAULT_CONTENT.to_string(),
            line_capacity: DEFAULT_LINE_CAPACITY,
            read_test: true,
            short_write: ShortWritePolicy::default(),
            byte_delay_ms: 0,
        }
    }
}

impl SmokeConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `SDMOUNT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_vars(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_READ_TEST) {
            self.read_test = parse_flag(&value).ok_or(ConfigError::Env {
                var: ENV_READ_TEST,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_MOUNT_POINT) {
            self.mount_point = value;
        }
        if let Some(value) = lookup(ENV_TEST_FILE) {
            self.test_file = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { message };

        let mount_point = VolumePath::parse(&self.mount_point).map_err(|e| invalid(e.to_string()))?;
        if !mount_point.is_root() {
            return Err(invalid(format!(
                "mount point {} must not contain a path",
                self.mount_point
            )));
        }

        let test_file = VolumePath::parse(&self.test_file).map_err(|e| invalid(e.to_string()))?;
        test_file
            .ensure_under(mount_point.mount_point())
            .map_err(|e| invalid(e.to_string()))?;
        if test_file.is_root() {
            return Err(invalid("test file must name a file".to_string()));
        }

        if self.content.contains('\n') {
            return Err(invalid("content must be a single line".to_string()));
        }
        if self.line_capacity < 2 {
            return Err(invalid(format!(
                "line capacity {} is too small",
                self.line_capacity
            )));
        }
        if self.read_test && self.content.len() + 1 > self.line_capacity {
            return Err(invalid(format!(
                "content of {} bytes does not fit the {} byte read buffer",
                self.content.len(),
                self.line_capacity
            )));
        }
        Ok(())
    }

    pub fn byte_delay(&self) -> Option<Duration> {
        (self.byte_delay_ms > 0).then(|| Duration::from_millis(self.byte_delay_ms))
    }

    pub fn descriptor(&self) -> MountDescriptor {
        MountDescriptor {
            kind: FsKind::Fat,
            backing: self.device_id.clone(),
            mount_point: self.mount_point.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" => Some(false),
        _ => None,
    }
}
