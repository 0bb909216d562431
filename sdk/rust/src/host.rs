//! Host collaborators used by the mount manager.
//!
//! Each concern the manager needs from the operating system sits behind a
//! narrow trait so that tests can substitute fakes:
//! - [`ProcessRunner`]: spawn a helper and capture its output
//! - [`HostFs`]: directory creation/removal and executable lookup
//! - [`Identity`]: effective user id, queried fresh on every call
//! - [`Environment`]: environment variables and the path-list separator
//! - [`PlatformInfo`]: whether this host can loop-mount images at all
//! - [`MediaProber`]: stream files inside a mounted DVD/Blu-ray layout

use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::probe::DiscLayoutProber;
use crate::types::ContainerKind;

/// Exit code and captured streams of a finished helper process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description of a failed run, used in error messages.
    pub fn describe_failure(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Spawns helper executables.
///
/// A spawn failure must be reported through the `Err` arm so callers can tell
/// it apart from a process that ran and exited non-zero.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput>;
}

/// Runs helpers with `tokio::process`, stdin closed and output captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Filesystem operations the manager performs.
pub trait HostFs: Send + Sync {
    /// Create a single directory; fails if it already exists.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory (never recursive).
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// True only for existing regular files (directories do not count).
    fn file_exists(&self, path: &Path) -> bool;

    /// Make a path absolute without resolving symlinks.
    fn absolute(&self, path: &Path) -> io::Result<PathBuf>;

    /// Entries directly under `path`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl HostFs for StdFs {
    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        std::path::absolute(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

/// Effective identity of the current process.
pub trait Identity: Send + Sync {
    /// Effective numeric user id; 0 means superuser.
    fn effective_uid(&self) -> u32;

    fn is_superuser(&self) -> bool {
        self.effective_uid() == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessIdentity;

impl Identity for ProcessIdentity {
    #[cfg(unix)]
    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() }
    }

    #[cfg(not(unix))]
    fn effective_uid(&self) -> u32 {
        u32::MAX
    }
}

pub trait Environment: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    /// Separator between entries of `PATH`.
    fn path_list_separator(&self) -> char {
        if cfg!(windows) {
            ';'
        } else {
            ':'
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

pub trait PlatformInfo: Send + Sync {
    /// Whether the current platform supports mounting images with `mount`.
    fn supports_image_mounting(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl PlatformInfo for HostPlatform {
    fn supports_image_mounting(&self) -> bool {
        cfg!(target_os = "linux")
    }
}

/// Lists playable stream files inside a mounted disc layout.
pub trait MediaProber: Send + Sync {
    fn stream_files(&self, mount_point: &Path, kind: ContainerKind) -> io::Result<Vec<PathBuf>>;
}

/// The set of collaborators a manager runs against.
#[derive(Clone)]
pub struct Host {
    pub runner: Arc<dyn ProcessRunner>,
    pub fs: Arc<dyn HostFs>,
    pub identity: Arc<dyn Identity>,
    pub env: Arc<dyn Environment>,
    pub platform: Arc<dyn PlatformInfo>,
    pub prober: Arc<dyn MediaProber>,
}

impl Host {
    /// Collaborators backed by the real operating system.
    pub fn system() -> Self {
        Self {
            runner: Arc::new(TokioProcessRunner),
            fs: Arc::new(StdFs),
            identity: Arc::new(ProcessIdentity),
            env: Arc::new(ProcessEnvironment),
            platform: Arc::new(HostPlatform),
            prober: Arc::new(DiscLayoutProber),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn HostFs>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn PlatformInfo>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.prober = prober;
        self
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
