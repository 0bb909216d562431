pub mod config;
pub mod status;

#[cfg(unix)]
mod mount;
#[cfg(not(unix))]
#[path = "mount_stub.rs"]
mod mount;

pub use mount::{list, mount, MountArgs};
