use anyhow::Result;
use isomount_sdk::{ContainerKind, MountManager};
use std::path::PathBuf;

/// Arguments for the mount and ls commands.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MountArgs {
    /// The disc image to mount.
    pub image: PathBuf,
    /// Layout of the image.
    pub kind: ContainerKind,
    /// Print the mount description as JSON.
    pub json: bool,
}

/// Mount a disc image and hold it until interrupted.
pub async fn mount(_manager: &MountManager, _args: MountArgs) -> Result<()> {
    anyhow::bail!("Mounting disc images is only available on Unix")
}

/// Mount a disc image, list its contents and release it.
pub async fn list(_manager: &MountManager, _args: MountArgs) -> Result<()> {
    anyhow::bail!("Mounting disc images is only available on Unix")
}
