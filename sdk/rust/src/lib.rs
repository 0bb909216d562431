//! Mount lifecycle management for optical-disc images.
//!
//! A [`MountManager`] mounts ISO images (plain, DVD or Blu-ray) with the
//! platform `mount` utility, escalating through `sudo` when the process is not
//! running as root, and bounds how many mounts may be held at once. Each
//! successful mount yields a [`MountHandle`]; releasing it unmounts the image,
//! frees the slot and removes the mount point directory.

pub mod command;
pub mod error;
pub mod handle;
pub mod host;
pub mod manager;
pub mod options;
pub mod probe;
pub mod resolver;
pub mod table;
pub mod types;

#[cfg(test)]
mod testing;

pub use command::{CommandLine, PrivilegeMode};
pub use error::{MountError, Result};
pub use handle::{MountHandle, MountInfo};
pub use host::{
    Environment, Host, HostFs, Identity, MediaProber, PlatformInfo, ProcessOutput, ProcessRunner,
};
pub use manager::MountManager;
pub use options::{MounterOptions, DEFAULT_MAX_CONCURRENT_MOUNTS};
pub use probe::DiscLayoutProber;
pub use resolver::{ExecutableResolver, ResolvedExecutables};
pub use table::MountRecord;
pub use types::{ContainerKind, MediaProtocol, MountRequest};

/// Re-exported so callers can build cancellation tokens without a direct
/// `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
