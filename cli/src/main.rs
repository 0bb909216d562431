mod cmd;

use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use cmd::MountArgs;
use isomount_sdk::{ContainerKind, MountError, MountManager};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "isomount")]
#[command(about = "Mount optical-disc images and clean up after them", long_about = None)]
struct Args {
    /// Options file (JSON); defaults to <config dir>/isomount/config.json
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory under which mount points are created
    #[arg(long, global = true, value_name = "DIR")]
    mount_root: Option<PathBuf>,

    /// Maximum number of images mounted at once
    #[arg(long, global = true, value_name = "N")]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show where the mount, umount and sudo helpers were found
    Which,
    /// Check whether an image can be mounted on this host
    CanMount {
        /// Path to the disc image
        path: PathBuf,

        /// Image layout: iso, dvd or bluray
        #[arg(long, default_value = "iso")]
        kind: ContainerKind,
    },
    /// Mount an image, print its mount point and hold it until Ctrl-C
    Mount {
        /// Path to the disc image
        image: PathBuf,

        /// Image layout: iso, dvd or bluray
        #[arg(long, default_value = "iso")]
        kind: ContainerKind,

        /// Print the mount description as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mount an image, list its top-level entries and release it
    Ls {
        /// Path to the disc image
        image: PathBuf,

        /// Image layout: iso, dvd or bluray
        #[arg(long, default_value = "iso")]
        kind: ContainerKind,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove empty mount points left behind by an earlier run
    Sweep,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_manager(args: &Args) -> AnyhowResult<MountManager> {
    let options = cmd::config::load_options(args.config.as_deref())?;
    let options =
        cmd::config::apply_overrides(options, args.mount_root.clone(), args.max_concurrent);
    MountManager::system(options).context("Failed to set up mount manager")
}

async fn run(args: Args) -> AnyhowResult<bool> {
    let manager = build_manager(&args)?;
    let mut stdout = std::io::stdout().lock();

    match args.command {
        Commands::Which => cmd::status::which(&mut stdout, &manager)?,
        Commands::CanMount { path, kind } => {
            return cmd::status::can_mount(&mut stdout, &manager, &path, kind);
        }
        Commands::Mount { image, kind, json } => {
            drop(stdout);
            cmd::mount(&manager, MountArgs { image, kind, json }).await?;
        }
        Commands::Ls { image, kind, json } => {
            drop(stdout);
            cmd::list(&manager, MountArgs { image, kind, json }).await?;
        }
        Commands::Sweep => cmd::status::sweep(&mut stdout, &manager)?,
    }
    Ok(true)
}

/// Whether the failure happened while tearing a mount down.
fn needs_manual_cleanup(err: &anyhow::Error) -> bool {
    err.downcast_ref::<MountError>().is_some_and(MountError::is_teardown)
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if needs_manual_cleanup(&e) {
                eprintln!("The image may still be mounted; unmount it, then run `isomount sweep`.");
            }
            std::process::exit(1);
        }
    }
}
