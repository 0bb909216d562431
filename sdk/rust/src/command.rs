use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MountError, Result};
use crate::host::Identity;
use crate::resolver::ResolvedExecutables;

/// How a helper is invoked for the current effective identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// Already superuser: run the helper directly.
    Direct,
    /// Run the helper through the escalation helper.
    Escalated,
}

impl PrivilegeMode {
    /// Decided from a fresh identity query; never cached.
    pub fn current(identity: &dyn Identity) -> Self {
        let uid = identity.effective_uid();
        tracing::debug!("Current effective UID is [{}]", uid);
        if uid == 0 {
            PrivilegeMode::Direct
        } else {
            PrivilegeMode::Escalated
        }
    }
}

/// Program plus arguments, passed to the process runner without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandLine {
    fn build(
        mode: PrivilegeMode,
        helper: &Path,
        escalation: Option<&Path>,
        helper_args: Vec<OsString>,
    ) -> Result<Self> {
        match mode {
            PrivilegeMode::Direct => Ok(Self {
                program: helper.to_path_buf(),
                args: helper_args,
            }),
            PrivilegeMode::Escalated => {
                let escalation = escalation.ok_or_else(|| MountError::HelpersUnavailable {
                    missing: "privilege escalation helper".to_string(),
                })?;
                let mut args = Vec::with_capacity(helper_args.len() + 1);
                args.push(helper.as_os_str().to_os_string());
                args.extend(helper_args);
                Ok(Self {
                    program: escalation.to_path_buf(),
                    args,
                })
            }
        }
    }

    /// `mount <image> <mount_point>`, escalated when not superuser.
    pub fn mount(
        mode: PrivilegeMode,
        helpers: &ResolvedExecutables,
        image: &Path,
        mount_point: &Path,
    ) -> Result<Self> {
        let helper = helpers.mount().ok_or_else(|| MountError::HelpersUnavailable {
            missing: "mount helper".to_string(),
        })?;
        Self::build(
            mode,
            helper,
            helpers.escalation(),
            vec![image.into(), mount_point.into()],
        )
    }

    /// `umount <mount_point>`, escalated when not superuser.
    pub fn unmount(
        mode: PrivilegeMode,
        helpers: &ResolvedExecutables,
        mount_point: &Path,
    ) -> Result<Self> {
        let helper = helpers.unmount().ok_or_else(|| MountError::HelpersUnavailable {
            missing: "unmount helper".to_string(),
        })?;
        Self::build(mode, helper, helpers.escalation(), vec![mount_point.into()])
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " \"{}\"", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
