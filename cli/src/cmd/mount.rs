use anyhow::{Context, Result};
use isomount_sdk::{CancellationToken, ContainerKind, MountInfo, MountManager};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the mount and ls commands.
#[derive(Debug, Clone)]
pub struct MountArgs {
    /// The disc image to mount.
    pub image: PathBuf,
    /// Layout of the image.
    pub kind: ContainerKind,
    /// Print the mount description as JSON.
    pub json: bool,
}

/// Cancelled on the first Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received CTRL-C, releasing...");
        }
        child.cancel();
    });
    token
}

fn print_info(stdout: &mut impl Write, info: &MountInfo, json: bool) -> Result<()> {
    if json {
        writeln!(stdout, "{}", serde_json::to_string(info)?)?;
    } else {
        writeln!(stdout, "{}", info.mounted_path.display())?;
        for file in &info.stream_files {
            writeln!(stdout, "{}", file.display())?;
        }
    }
    stdout.flush()?;
    Ok(())
}

/// Mount a disc image and hold it until interrupted.
pub async fn mount(manager: &MountManager, args: MountArgs) -> Result<()> {
    let cancel = interrupt_token();

    let mut handle = manager
        .mount(&args.image, args.kind, &cancel)
        .await
        .with_context(|| format!("Failed to mount {}", args.image.display()))?;

    print_info(&mut std::io::stdout().lock(), handle.info(), args.json)?;
    eprintln!("Press Ctrl-C to unmount");

    cancel.cancelled().await;

    handle
        .release()
        .await
        .with_context(|| format!("Failed to release {}", handle.mounted_path().display()))
}

/// Mount a disc image, list its top-level entries and release it.
pub async fn list(manager: &MountManager, args: MountArgs) -> Result<()> {
    let cancel = interrupt_token();

    let (entries, info) = manager
        .with_mount(&args.image, args.kind, &cancel, |info| async move {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&info.mounted_path).await?;
            while let Some(entry) = dir.next_entry().await? {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
            entries.sort();
            Ok::<_, std::io::Error>((entries, info))
        })
        .await
        .with_context(|| format!("Failed to mount {}", args.image.display()))?
        .context("Failed to read mounted image")?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        let value = serde_json::json!({
            "image": info.source_image_path,
            "entries": entries,
            "stream_files": info.stream_files,
        });
        writeln!(stdout, "{}", value)?;
    } else {
        for entry in entries {
            writeln!(stdout, "{}", entry)?;
        }
        if !info.stream_files.is_empty() {
            writeln!(stdout, "streams:")?;
            for file in &info.stream_files {
                writeln!(stdout, "  {}", file.display())?;
            }
        }
    }
    Ok(())
}
