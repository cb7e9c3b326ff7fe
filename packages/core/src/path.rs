//! Volume paths of the form `/SD:/dir/file.txt`.

use std::fmt;

/// Characters a FAT long file name may not contain.
const FORBIDDEN: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Longest name a FAT directory entry chain can hold.
const MAX_COMPONENT_LEN: usize = 255;

/// Errors related to path parsing and validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must be absolute: '{path}'")]
    NotAbsolute { path: String },

    #[error("missing mount point in '{path}' (expected a leading '/NAME:' component)")]
    MissingMountPoint { path: String },

    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },

    #[error("path '{path}' is not under mount point '{mount_point}'")]
    ForeignMount { path: String, mount_point: String },
}

/// An absolute path on a mounted volume.
///
/// The first component names the mount point and ends in `:` (`/SD:`); the
/// remaining components are validated FAT long names. Empty components are
/// ignored, so `/SD://a/` and `/SD:/a` are the same path.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VolumePath {
    mount_point: String,
    components: Vec<String>,
}

impl VolumePath {
    /// Parse a path string, validating components.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sdmount_core::VolumePath;
    ///
    /// let path = VolumePath::parse("/SD:/logs/test_data.txt").unwrap();
    /// assert_eq!(path.mount_point(), "/SD:");
    /// assert_eq!(path.relative(), "logs/test_data.txt");
    ///
    /// assert!(VolumePath::parse("/SD:").unwrap().is_root());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if !s.starts_with('/') {
            return Err(PathError::NotAbsolute {
                path: s.to_string(),
            });
        }

        let mut parts = s.split('/').filter(|c| !c.is_empty());
        let volume = parts.next().ok_or_else(|| PathError::MissingMountPoint {
            path: s.to_string(),
        })?;
        let name = volume
            .strip_suffix(':')
            .filter(|name| !name.is_empty() && !name.contains(':'))
            .ok_or_else(|| PathError::MissingMountPoint {
                path: s.to_string(),
            })?;

        let components: Vec<String> = parts.map(|c| c.to_string()).collect();
        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i + 1)?;
        }

        Ok(VolumePath {
            mount_point: format!("/{}:", name),
            components,
        })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        let invalid = |message: String| PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message,
        };

        if component == "." || component == ".." {
            return Err(invalid("relative components are not supported".to_string()));
        }
        if component.chars().count() > MAX_COMPONENT_LEN {
            return Err(invalid(format!(
                "longer than {} characters",
                MAX_COMPONENT_LEN
            )));
        }
        if let Some(c) = component
            .chars()
            .find(|c| FORBIDDEN.contains(c) || c.is_control())
        {
            return Err(invalid(format!("invalid character {:?}", c)));
        }
        if component.ends_with(' ') || component.ends_with('.') {
            return Err(invalid("trailing space or dot".to_string()));
        }

        Ok(())
    }

    /// The mount point prefix, e.g. `/SD:`.
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// True for the volume root itself.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The path below the mount point, `/`-separated, empty for the root.
    pub fn relative(&self) -> String {
        self.components.join("/")
    }

    /// Check this path lives under `mount_point`.
    pub fn ensure_under(&self, mount_point: &str) -> Result<(), PathError> {
        if self.mount_point == mount_point {
            Ok(())
        } else {
            Err(PathError::ForeignMount {
                path: self.to_string(),
                mount_point: mount_point.to_string(),
            })
        }
    }
}

impl fmt::Display for VolumePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mount_point)?;
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}
