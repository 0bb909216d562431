use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::host::{Environment, HostFs};
use crate::options::MounterOptions;

/// Looks up executables on `PATH`, first match wins.
pub struct ExecutableResolver<'a> {
    env: &'a dyn Environment,
    fs: &'a dyn HostFs,
}

impl<'a> ExecutableResolver<'a> {
    pub fn new(env: &'a dyn Environment, fs: &'a dyn HostFs) -> Self {
        Self { env, fs }
    }

    /// Directories of `PATH` in search order, trimmed, empty entries dropped.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let path = self.env.var("PATH").unwrap_or_default();
        path.split(self.env.path_list_separator())
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Absolute path of the first `<dir>/<name>` that exists, if any.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        for dir in self.search_dirs() {
            let candidate = dir.join(name);
            if !self.fs.file_exists(&candidate) {
                continue;
            }
            match self.fs.absolute(&candidate) {
                Ok(path) => return Some(path),
                Err(e) => {
                    debug!("Skipping {}: {}", candidate.display(), e);
                }
            }
        }
        None
    }
}

/// Helper executables resolved once for the lifetime of a manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedExecutables {
    pub mount: Option<PathBuf>,
    pub unmount: Option<PathBuf>,
    pub escalation: Option<PathBuf>,
}

impl ResolvedExecutables {
    pub fn resolve(resolver: &ExecutableResolver<'_>, options: &MounterOptions) -> Self {
        let resolved = Self {
            mount: resolver.resolve(&options.mount_helper),
            unmount: resolver.resolve(&options.unmount_helper),
            escalation: resolver.resolve(&options.escalation_helper),
        };

        for (name, path) in [
            (&options.escalation_helper, &resolved.escalation),
            (&options.mount_helper, &resolved.mount),
            (&options.unmount_helper, &resolved.unmount),
        ] {
            match path {
                Some(path) => info!("Using version of [{}] located at [{}]", name, path.display()),
                None => info!("No [{}] found on PATH", name),
            }
        }

        resolved
    }

    /// True when mount, unmount and escalation helpers were all found.
    pub fn all_available(&self) -> bool {
        self.mount.is_some() && self.unmount.is_some() && self.escalation.is_some()
    }

    pub fn mount(&self) -> Option<&Path> {
        self.mount.as_deref()
    }

    pub fn unmount(&self) -> Option<&Path> {
        self.unmount.as_deref()
    }

    pub fn escalation(&self) -> Option<&Path> {
        self.escalation.as_deref()
    }
}
