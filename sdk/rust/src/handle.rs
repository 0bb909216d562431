use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::manager::Helpers;
use crate::types::{ContainerKind, MediaProtocol};

/// One-shot notification run when a handle starts its teardown.
///
/// Owns the handle's concurrency permit and a weak reference to the manager's
/// mount table, so running it frees the slot and drops the bookkeeping entry.
pub(crate) type ReleaseCallback = Box<dyn FnOnce() + Send + 'static>;

/// Owned description of a live mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub id: Uuid,
    pub source_image_path: PathBuf,
    pub mounted_path: PathBuf,
    pub container_kind: ContainerKind,
    pub protocol: MediaProtocol,
    /// Playable streams for DVD/Blu-ray images; empty otherwise or when
    /// probing failed.
    pub stream_files: Vec<PathBuf>,
}

/// A mounted disc image.
///
/// Created only by [`MountManager::mount`](crate::MountManager::mount) after
/// the mount helper succeeded. Call [`release`](Self::release) to unmount and
/// remove the mount point. A handle dropped without release is torn down on
/// a private runtime; its slot is held until that teardown starts.
pub struct MountHandle {
    info: MountInfo,
    helpers: Arc<Helpers>,
    on_release: Option<ReleaseCallback>,
    released: bool,
}

impl MountHandle {
    pub(crate) fn new(info: MountInfo, helpers: Arc<Helpers>, on_release: ReleaseCallback) -> Self {
        info!(
            "{} mounted to {}",
            info.source_image_path.display(),
            info.mounted_path.display()
        );
        Self {
            info,
            helpers,
            on_release: Some(on_release),
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn source_image_path(&self) -> &Path {
        &self.info.source_image_path
    }

    pub fn mounted_path(&self) -> &Path {
        &self.info.mounted_path
    }

    pub fn container_kind(&self) -> ContainerKind {
        self.info.container_kind
    }

    pub fn protocol(&self) -> MediaProtocol {
        self.info.protocol
    }

    pub fn stream_files(&self) -> &[PathBuf] {
        &self.info.stream_files
    }

    pub fn info(&self) -> &MountInfo {
        &self.info
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unmount the image and delete its mount point.
    ///
    /// The slot is returned before the unmount helper runs. Unmount and
    /// directory removal are both attempted; their failures are reported
    /// independently. Only the first call does any work: later calls return
    /// `Ok(())` even if the first one failed part-way.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            debug!("{} already released", self.info.mounted_path.display());
            return Ok(());
        }

        info!("Unmounting {}...", self.info.mounted_path.display());
        self.begin_release();
        self.helpers.teardown(&self.info.mounted_path).await
    }

    fn begin_release(&mut self) {
        if let Some(on_release) = self.on_release.take() {
            on_release();
        }
        self.released = true;
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let on_release = self.on_release.take();
        let helpers = self.helpers.clone();
        let mount_point = self.info.mounted_path.clone();
        warn!(
            "Mount handle for {} dropped without release, tearing down",
            mount_point.display()
        );

        // The slot stays held until the teardown actually starts.
        if tokio::runtime::Handle::try_current().is_err() {
            teardown_blocking(helpers, mount_point, on_release);
            return;
        }
        let spawned = std::thread::Builder::new()
            .name("isomount-teardown".to_string())
            .spawn(move || teardown_blocking(helpers, mount_point, on_release));
        if let Err(e) = spawned {
            error!("Unable to start teardown thread: {}", e);
        }
    }
}

/// Run the release callback and teardown to completion on a private runtime.
///
/// Used from `Drop`, where the caller's runtime may be gone or about to shut
/// down and would cancel a spawned task before it ran.
fn teardown_blocking(
    helpers: Arc<Helpers>,
    mount_point: PathBuf,
    on_release: Option<ReleaseCallback>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(
                "Unable to build teardown runtime, {} stays mounted: {}",
                mount_point.display(),
                e
            );
            return;
        }
    };

    runtime.block_on(async move {
        if let Some(on_release) = on_release {
            on_release();
        }
        if let Err(e) = helpers.teardown(&mount_point).await {
            warn!("Background teardown failed: {}", e);
        }
    });
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("info", &self.info)
            .field("released", &self.released)
            .finish()
    }
}
