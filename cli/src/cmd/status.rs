use anyhow::{Context, Result};
use isomount_sdk::{ContainerKind, MountManager};
use std::io::Write;
use std::path::Path;

/// Print where each helper was found.
pub fn which(stdout: &mut impl Write, manager: &MountManager) -> Result<()> {
    let options = manager.options();
    let executables = manager.executables();
    for (name, path) in [
        (&options.mount_helper, executables.mount()),
        (&options.unmount_helper, executables.unmount()),
        (&options.escalation_helper, executables.escalation()),
    ] {
        match path {
            Some(path) => writeln!(stdout, "{}: {}", name, path.display())?,
            None => writeln!(stdout, "{}: not found", name)?,
        }
    }
    Ok(())
}

/// Print `yes` or `no`; returns whether the image can be mounted.
pub fn can_mount(
    stdout: &mut impl Write,
    manager: &MountManager,
    path: &Path,
    kind: ContainerKind,
) -> Result<bool> {
    let mountable = manager.can_mount(path, kind);
    writeln!(stdout, "{}", if mountable { "yes" } else { "no" })?;
    Ok(mountable)
}

pub fn sweep(stdout: &mut impl Write, manager: &MountManager) -> Result<()> {
    let removed = manager
        .sweep_stale_mount_points()
        .context("Failed to sweep stale mount points")?;
    writeln!(
        stdout,
        "Removed {} stale mount point(s) under {}",
        removed,
        manager.options().mount_root.display()
    )?;
    Ok(())
}
