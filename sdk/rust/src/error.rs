use std::io;
use std::path::PathBuf;
use std::result::Result as StdResult;

/// Errors produced while mounting or tearing down a disc image.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Mount helpers unavailable: missing {missing}")]
    HelpersUnavailable { missing: String },

    #[error(
        "Unable to create mount point {} for {} (permission denied)",
        .mount_point.display(),
        .image.display()
    )]
    PermissionDenied {
        image: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to create mount point {} for {}", .mount_point.display(), .image.display())]
    DirectoryCreateFailed {
        image: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to mount {}: {reason}", .image.display())]
    MountFailed { image: PathBuf, reason: String },

    #[error("Unable to unmount {}: {reason}", .mount_point.display())]
    UnmountFailed { mount_point: PathBuf, reason: String },

    #[error("Unable to delete mount point {}", .mount_point.display())]
    CleanupFailed {
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{unmount}; additionally: {cleanup}")]
    TeardownFailed {
        unmount: Box<MountError>,
        cleanup: Box<MountError>,
    },

    #[error("Mount of {} cancelled while waiting for a free slot", .image.display())]
    Cancelled { image: PathBuf },
}

impl MountError {
    /// Whether this error came out of handle teardown rather than mounting.
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            MountError::UnmountFailed { .. }
                | MountError::CleanupFailed { .. }
                | MountError::TeardownFailed { .. }
        )
    }
}

pub type Result<T> = StdResult<T, MountError>;
