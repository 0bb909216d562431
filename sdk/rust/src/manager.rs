use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::{CommandLine, PrivilegeMode};
use crate::error::{MountError, Result};
use crate::handle::{MountHandle, MountInfo, ReleaseCallback};
use crate::host::{Host, ProcessOutput};
use crate::options::MounterOptions;
use crate::resolver::{ExecutableResolver, ResolvedExecutables};
use crate::table::{MountRecord, MountTable};
use crate::types::{has_iso_extension, ContainerKind, MediaProtocol};

/// Collaborators and resolved helpers shared by the manager and its handles.
pub(crate) struct Helpers {
    pub(crate) host: Host,
    pub(crate) executables: ResolvedExecutables,
}

impl Helpers {
    /// Run a helper, logging its captured output.
    pub(crate) async fn run(&self, cmd: &CommandLine) -> io::Result<ProcessOutput> {
        let output = self.host.runner.run(&cmd.program, &cmd.args).await?;
        debug!("Standard output from process is [{}]", output.stdout.trim());
        debug!("Standard error from process is [{}]", output.stderr.trim());
        Ok(output)
    }

    /// Unmount, then remove the mount point. Both steps always run.
    pub(crate) async fn teardown(&self, mount_point: &Path) -> Result<()> {
        let unmount = self.unmount(mount_point).await;
        let cleanup = self.remove_mount_point(mount_point);

        match (unmount, cleanup) {
            (Ok(()), Ok(())) => {
                info!("Unmount of {} completed successfully", mount_point.display());
                Ok(())
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(unmount), Err(cleanup)) => Err(MountError::TeardownFailed {
                unmount: Box::new(unmount),
                cleanup: Box::new(cleanup),
            }),
        }
    }

    async fn unmount(&self, mount_point: &Path) -> Result<()> {
        let mode = PrivilegeMode::current(&*self.host.identity);
        let cmd = CommandLine::unmount(mode, &self.executables, mount_point).map_err(|e| {
            MountError::UnmountFailed {
                mount_point: mount_point.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        debug!("Umount command [{}]", cmd);

        let reason = match self.run(&cmd).await {
            Ok(output) if output.success() => return Ok(()),
            Ok(output) => output.describe_failure(),
            Err(e) => format!("failed to launch {}: {}", cmd.program.display(), e),
        };
        warn!("Unmount of {} completed with errors: {}", mount_point.display(), reason);
        Err(MountError::UnmountFailed {
            mount_point: mount_point.to_path_buf(),
            reason,
        })
    }

    fn remove_mount_point(&self, mount_point: &Path) -> Result<()> {
        self.host.fs.remove_dir(mount_point).map_err(|source| {
            warn!(
                "Unable to remove mount point {}: {}",
                mount_point.display(),
                source
            );
            MountError::CleanupFailed {
                mount_point: mount_point.to_path_buf(),
                source,
            }
        })
    }
}

struct ManagerInner {
    options: MounterOptions,
    helpers: Arc<Helpers>,
    slots: Arc<Semaphore>,
    table: MountTable,
}

/// Mounts disc images with the platform `mount` utility.
///
/// Cheap to clone; all clones share one slot pool and one mount table. The
/// manager never holds a handle: each [`MountHandle`] returns its slot through
/// a one-shot callback when released.
#[derive(Clone)]
pub struct MountManager {
    inner: Arc<ManagerInner>,
}

impl MountManager {
    /// Create a manager, resolving helper executables once.
    ///
    /// # Examples
    /// ```no_run
    /// use isomount_sdk::{CancellationToken, ContainerKind, MountManager, MounterOptions};
    ///
    /// # async fn example() -> isomount_sdk::Result<()> {
    /// let manager = MountManager::system(MounterOptions::default())?;
    /// let mut handle = manager
    ///     .mount("/media/disc.iso", ContainerKind::PlainIso, &CancellationToken::new())
    ///     .await?;
    /// println!("mounted at {}", handle.mounted_path().display());
    /// handle.release().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(options: MounterOptions, host: Host) -> Result<Self> {
        options.validate()?;

        debug!(
            "System PATH is currently set to [{}]",
            host.env.var("PATH").unwrap_or_default()
        );
        debug!("System path separator is [{}]", host.env.path_list_separator());
        debug!("Mount point root is [{}]", options.mount_root.display());

        let executables = {
            let resolver = ExecutableResolver::new(&*host.env, &*host.fs);
            ResolvedExecutables::resolve(&resolver, &options)
        };

        Ok(Self {
            inner: Arc::new(ManagerInner {
                slots: Arc::new(Semaphore::new(options.max_concurrent_mounts)),
                options,
                helpers: Arc::new(Helpers { host, executables }),
                table: MountTable::new(),
            }),
        })
    }

    /// Create a manager against the real host.
    pub fn system(options: MounterOptions) -> Result<Self> {
        Self::new(options, Host::system())
    }

    pub fn options(&self) -> &MounterOptions {
        &self.inner.options
    }

    pub fn executables(&self) -> &ResolvedExecutables {
        &self.inner.helpers.executables
    }

    /// Whether `path` can be mounted here: supported platform, every helper
    /// resolved, and an `.iso` extension.
    pub fn can_mount(&self, path: impl AsRef<Path>, _kind: ContainerKind) -> bool {
        let helpers = &self.inner.helpers;
        helpers.host.platform.supports_image_mounting()
            && helpers.executables.all_available()
            && has_iso_extension(path.as_ref())
    }

    /// Slots currently free.
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Live mounts, oldest first.
    pub fn active_mounts(&self) -> Vec<MountRecord> {
        self.inner.table.snapshot()
    }

    /// Mount `image` under a fresh directory of the mount root.
    ///
    /// Waits for a free slot first; `cancel` is honoured only during that
    /// wait. On any failure the slot is returned and the directory removed
    /// before the error is propagated.
    pub async fn mount(
        &self,
        image: impl AsRef<Path>,
        kind: ContainerKind,
        cancel: &CancellationToken,
    ) -> Result<MountHandle> {
        let image = image.as_ref();
        if image.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument(
                "image path must not be empty".to_string(),
            ));
        }
        self.check_helpers()?;

        let permit = self.acquire_slot(image, cancel).await?;

        let id = Uuid::new_v4();
        let mount_point = self.inner.options.mount_root.join(id.to_string());
        info!("Attempting to mount [{}]", image.display());
        debug!("ISO will be mounted at [{}]", mount_point.display());

        self.create_mount_point(image, &mount_point)?;
        let pending = PendingMount::track(
            &self.inner,
            MountRecord {
                id,
                source_image_path: image.to_path_buf(),
                mount_point: mount_point.clone(),
                container_kind: kind,
                mounted_at: SystemTime::now(),
            },
        );

        let helpers = &self.inner.helpers;
        let mode = PrivilegeMode::current(&*helpers.host.identity);
        let cmd = CommandLine::mount(mode, &helpers.executables, image, &mount_point)?;
        debug!("Mount command [{}]", cmd);

        let failure = match helpers.run(&cmd).await {
            Ok(output) if output.success() => None,
            Ok(output) => Some(output.describe_failure()),
            Err(e) => Some(format!("failed to launch {}: {}", cmd.program.display(), e)),
        };
        if let Some(reason) = failure {
            info!("ISO mount of [{}] completed with errors", image.display());
            return Err(MountError::MountFailed {
                image: image.to_path_buf(),
                reason,
            });
        }
        info!("ISO mount completed successfully");

        let stream_files = self.probe_streams(&mount_point, kind).await;
        pending.commit();

        let table = self.inner.table.downgrade();
        let on_release: ReleaseCallback = Box::new(move || {
            table.remove(&id);
            drop(permit);
        });

        Ok(MountHandle::new(
            MountInfo {
                id,
                source_image_path: image.to_path_buf(),
                mounted_path: mount_point,
                container_kind: kind,
                protocol: MediaProtocol::File,
                stream_files,
            },
            helpers.clone(),
            on_release,
        ))
    }

    /// Mount `image`, run `f` against it, then release it.
    ///
    /// The handle is released whether or not `f` succeeds; release errors are
    /// logged rather than returned. If the returned future is dropped early
    /// the handle's `Drop` finishes the teardown.
    pub async fn with_mount<F, Fut, T>(
        &self,
        image: impl AsRef<Path>,
        kind: ContainerKind,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(MountInfo) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut handle = self.mount(image, kind, cancel).await?;
        let output = f(handle.info().clone()).await;
        if let Err(e) = handle.release().await {
            warn!("Releasing {} failed: {}", handle.mounted_path().display(), e);
        }
        Ok(output)
    }

    /// Remove empty mount point directories left behind by an earlier run.
    ///
    /// Only directories named like a mount id and not tracked by this manager
    /// are touched; mounts still in flight are tracked from the moment their
    /// directory exists. Removal is non-recursive, so anything still mounted
    /// or holding files stays.
    pub fn sweep_stale_mount_points(&self) -> Result<usize> {
        let root = &self.inner.options.mount_root;
        let fs = &self.inner.helpers.host.fs;

        let entries = match fs.list_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(MountError::CleanupFailed {
                    mount_point: root.clone(),
                    source,
                })
            }
        };

        let mut removed = 0;
        for entry in entries {
            let is_mount_id = entry
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| Uuid::parse_str(name).is_ok())
                .unwrap_or(false);
            if !is_mount_id || self.inner.table.contains_mount_point(&entry) {
                continue;
            }
            match fs.remove_dir(&entry) {
                Ok(()) => {
                    info!("Removed stale mount point {}", entry.display());
                    removed += 1;
                }
                Err(e) => warn!("Leaving stale mount point {}: {}", entry.display(), e),
            }
        }
        Ok(removed)
    }

    fn check_helpers(&self) -> Result<()> {
        let options = &self.inner.options;
        let helpers = &self.inner.helpers;
        let executables = &helpers.executables;

        let mut missing = Vec::new();
        if executables.mount.is_none() {
            missing.push(options.mount_helper.as_str());
        }
        if executables.unmount.is_none() {
            missing.push(options.unmount_helper.as_str());
        }
        if executables.escalation.is_none() && !helpers.host.identity.is_superuser() {
            missing.push(options.escalation_helper.as_str());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MountError::HelpersUnavailable {
                missing: missing.join(", "),
            })
        }
    }

    async fn acquire_slot(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit> {
        let slots = self.inner.slots.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MountError::Cancelled {
                image: image.to_path_buf(),
            }),
            permit = slots.acquire_owned() => permit.map_err(|_| MountError::Cancelled {
                image: image.to_path_buf(),
            }),
        }
    }

    fn create_mount_point(&self, image: &Path, mount_point: &Path) -> Result<()> {
        let fs = &self.inner.helpers.host.fs;
        fs.create_dir_all(&self.inner.options.mount_root)
            .and_then(|()| fs.create_dir(mount_point))
            .map_err(|source| {
                let image = image.to_path_buf();
                let mount_point = mount_point.to_path_buf();
                if source.kind() == io::ErrorKind::PermissionDenied {
                    MountError::PermissionDenied {
                        image,
                        mount_point,
                        source,
                    }
                } else {
                    MountError::DirectoryCreateFailed {
                        image,
                        mount_point,
                        source,
                    }
                }
            })
    }

    /// Walk the mounted disc for playable streams off the async workers.
    async fn probe_streams(&self, mount_point: &Path, kind: ContainerKind) -> Vec<PathBuf> {
        if !kind.has_stream_layout() {
            return Vec::new();
        }
        let prober = self.inner.helpers.host.prober.clone();
        let root = mount_point.to_path_buf();
        let probed = tokio::task::spawn_blocking(move || prober.stream_files(&root, kind))
            .await
            .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));

        match probed {
            Ok(files) => {
                debug!("Found {} stream files in {}", files.len(), mount_point.display());
                files
            }
            Err(e) => {
                warn!(
                    "Unable to list {} streams in {}: {}",
                    kind,
                    mount_point.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

/// A mount point that exists and is tracked in the table, but whose mount
/// has not succeeded yet.
///
/// Tracking it keeps a concurrent sweep away from the directory. Dropping it
/// uncommitted (error return or cancelled future) forgets the record and
/// removes the directory; the mount error wins over any removal failure.
struct PendingMount<'a> {
    inner: &'a ManagerInner,
    id: Uuid,
    mount_point: PathBuf,
    committed: bool,
}

impl<'a> PendingMount<'a> {
    fn track(inner: &'a ManagerInner, record: MountRecord) -> Self {
        let id = record.id;
        let mount_point = record.mount_point.clone();
        inner.table.insert(record);
        Self {
            inner,
            id,
            mount_point,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingMount<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.inner.table.remove(&self.id);
        if let Err(e) = self.inner.helpers.host.fs.remove_dir(&self.mount_point) {
            warn!(
                "Unhandled exception removing mount point {}: {}",
                self.mount_point.display(),
                e
            );
        }
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("options", &self.inner.options)
            .field("executables", &self.inner.helpers.executables)
            .field("available_slots", &self.available_slots())
            .field("table", &self.inner.table)
            .finish()
    }
}
