//! Fake host collaborators and a manager fixture for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::command::CommandLine;
use crate::host::{
    Environment, Host, HostFs, Identity, PlatformInfo, ProcessOutput, ProcessRunner, StdFs,
};
use crate::manager::MountManager;
use crate::options::MounterOptions;

#[derive(Debug, Default)]
pub struct FakeEnv {
    path: Option<String>,
}

impl FakeEnv {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn with_path_dirs<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let joined: Vec<String> = dirs
            .iter()
            .map(|d| d.as_ref().display().to_string())
            .collect();
        Self::with_path(joined.join(separator))
    }
}

impl Environment for FakeEnv {
    fn var(&self, key: &str) -> Option<String> {
        if key == "PATH" {
            self.path.clone()
        } else {
            None
        }
    }
}

/// Identity whose uid can be changed mid-test.
#[derive(Debug)]
pub struct FakeIdentity {
    uid: AtomicU32,
    /// Queries left before switching to an unprivileged uid; 0 disables.
    queries_until_drop: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(uid: u32) -> Self {
        Self {
            uid: AtomicU32::new(uid),
            queries_until_drop: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, uid: u32) {
        self.uid.store(uid, Ordering::SeqCst);
    }

    /// Report the current uid for `n` more queries, then uid 1000.
    pub fn drop_privileges_after(&self, n: usize) {
        self.queries_until_drop.store(n, Ordering::SeqCst);
    }
}

impl Identity for FakeIdentity {
    fn effective_uid(&self) -> u32 {
        let left = self.queries_until_drop.load(Ordering::SeqCst);
        if left > 0 {
            if left == 1 {
                self.queries_until_drop.store(0, Ordering::SeqCst);
                let uid = self.uid.load(Ordering::SeqCst);
                self.uid.store(1000, Ordering::SeqCst);
                return uid;
            }
            self.queries_until_drop.store(left - 1, Ordering::SeqCst);
        }
        self.uid.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct FakePlatform(pub bool);

impl PlatformInfo for FakePlatform {
    fn supports_image_mounting(&self) -> bool {
        self.0
    }
}

/// Filesystem that refuses to create directories.
#[derive(Debug, Default)]
pub struct DenyingFs;

impl HostFs for DenyingFs {
    fn create_dir(&self, _path: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        StdFs.remove_dir(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        StdFs.file_exists(path)
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        StdFs.absolute(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        StdFs.list_dir(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exit(i32),
    SpawnError,
}

type MountHook = Box<dyn FnOnce(&Path) + Send>;

/// Process runner that records every invocation and replays scripted
/// outcomes, defaulting to a clean exit.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandLine>>,
    script: Mutex<VecDeque<Outcome>>,
    on_mount: Mutex<Option<MountHook>>,
}

impl FakeRunner {
    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Queue the outcome of the next invocation.
    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Run `hook` with the mount point after the next successful invocation.
    pub fn on_mount(&self, hook: impl FnOnce(&Path) + Send + 'static) {
        *self.on_mount.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(CommandLine {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Exit(0));

        match outcome {
            Outcome::SpawnError => Err(io::Error::from(io::ErrorKind::NotFound)),
            Outcome::Exit(code) => {
                if code == 0 {
                    let hook = self.on_mount.lock().unwrap().take();
                    if let (Some(hook), Some(mount_point)) = (hook, args.last()) {
                        hook(Path::new(mount_point));
                    }
                }
                Ok(ProcessOutput {
                    code: Some(code),
                    stdout: String::new(),
                    stderr: if code == 0 {
                        String::new()
                    } else {
                        format!("helper failed with {}", code)
                    },
                })
            }
        }
    }
}

pub struct FixtureOptions {
    pub helpers: Vec<&'static str>,
    pub uid: u32,
    pub max_concurrent_mounts: usize,
    pub platform_supported: bool,
    pub deny_create: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            helpers: vec!["mount", "umount", "sudo"],
            uid: 0,
            max_concurrent_mounts: 3,
            platform_supported: true,
            deny_create: false,
        }
    }
}

/// A manager wired to fakes, with helpers in `<tmp>/bin` and mounts under
/// `<tmp>/mounts` (not created up front).
pub struct Fixture {
    pub dir: TempDir,
    pub runner: Arc<FakeRunner>,
    pub identity: Arc<FakeIdentity>,
    pub manager: MountManager,
}

impl Fixture {
    pub fn new(uid: u32) -> Self {
        Self::build(FixtureOptions {
            uid,
            ..FixtureOptions::default()
        })
    }

    pub fn build(options: FixtureOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        for helper in &options.helpers {
            std::fs::write(bin.join(helper), b"#!/bin/sh\n").unwrap();
        }

        let runner = Arc::new(FakeRunner::default());
        let identity = Arc::new(FakeIdentity::new(options.uid));
        let mut host = Host::system()
            .with_runner(runner.clone())
            .with_identity(identity.clone())
            .with_env(Arc::new(FakeEnv::with_path_dirs(&[&bin])))
            .with_platform(Arc::new(FakePlatform(options.platform_supported)));
        if options.deny_create {
            host = host.with_fs(Arc::new(DenyingFs));
        }

        let manager = MountManager::new(
            MounterOptions::with_mount_root(dir.path().join("mounts"))
                .with_max_concurrent_mounts(options.max_concurrent_mounts),
            host,
        )
        .unwrap();

        Self {
            dir,
            runner,
            identity,
            manager,
        }
    }

    pub fn bin(&self, name: &str) -> PathBuf {
        self.dir.path().join("bin").join(name)
    }

    pub fn mount_root(&self) -> PathBuf {
        self.dir.path().join("mounts")
    }

    pub fn image(&self) -> PathBuf {
        PathBuf::from("/media/disc.iso")
    }

    /// Directories currently present under the mount root.
    pub fn mount_points(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.mount_root()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
