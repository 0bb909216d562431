use crate::error::{MountError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default bound on mounts that may be in flight or held open at once.
pub const DEFAULT_MAX_CONCURRENT_MOUNTS: usize = 3;

/// Configuration options for a [`MountManager`](crate::MountManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MounterOptions {
    /// Directory under which per-mount directories are created.
    pub mount_root: PathBuf,
    /// Number of concurrency slots.
    pub max_concurrent_mounts: usize,
    /// Executable names looked up on `PATH`.
    pub mount_helper: String,
    pub unmount_helper: String,
    pub escalation_helper: String,
}

impl Default for MounterOptions {
    fn default() -> Self {
        Self {
            mount_root: std::env::temp_dir().join("isomount"),
            max_concurrent_mounts: DEFAULT_MAX_CONCURRENT_MOUNTS,
            mount_helper: "mount".to_string(),
            unmount_helper: "umount".to_string(),
            escalation_helper: "sudo".to_string(),
        }
    }
}

impl MounterOptions {
    /// Create options rooted at the given directory
    pub fn with_mount_root(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            ..Self::default()
        }
    }

    pub fn with_max_concurrent_mounts(mut self, max: usize) -> Self {
        self.max_concurrent_mounts = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_mounts == 0 {
            return Err(MountError::InvalidArgument(
                "max_concurrent_mounts must be at least 1".to_string(),
            ));
        }
        if self.mount_root.as_os_str().is_empty() || !self.mount_root.is_absolute() {
            return Err(MountError::InvalidArgument(format!(
                "mount_root must be an absolute path, got '{}'",
                self.mount_root.display()
            )));
        }
        for (field, name) in [
            ("mount_helper", &self.mount_helper),
            ("unmount_helper", &self.unmount_helper),
            ("escalation_helper", &self.escalation_helper),
        ] {
            if name.trim().is_empty() {
                return Err(MountError::InvalidArgument(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}
