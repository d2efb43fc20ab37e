//! The narrow boundary between the deployment logic and macOS.
//!
//! Mounting, unmounting and package installation all go through
//! `SystemPort`, so the state machine can be driven against a fake in
//! tests. `MacSystem` is the real implementation backed by `hdiutil` and
//! `installer`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::command_runner::{CommandOutput, run_command_safe};
use crate::commands::hdiutil::{AttachArgs, DetachArgs};
use crate::commands::installer::InstallerArgs;
use crate::config::DeployConfig;

/// Operating system primitives used by a deployment run.
pub trait SystemPort {
    /// Attach `image` without showing it in Finder.
    fn attach(&self, image: &Path) -> Result<CommandOutput>;

    /// Detach the device node (e.g. `disk4s1`).
    fn detach(&self, device: &str) -> Result<CommandOutput>;

    /// Run the package installer against `package`.
    fn run_installer(&self, package: &Path) -> Result<CommandOutput>;

    /// Directory attached volumes appear under.
    fn mount_root(&self) -> &Path;

    /// Whether a mounted volume is still present.
    fn volume_exists(&self, volume: &Path) -> bool {
        volume.is_dir()
    }

    /// Block the calling thread. Used by the unmount poll loop.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// `SystemPort` backed by the real macOS tools.
#[derive(Debug, Clone)]
pub struct MacSystem {
    hdiutil: PathBuf,
    installer: PathBuf,
    package_target: PathBuf,
    mount_root: PathBuf,
}

impl MacSystem {
    pub fn new(config: &DeployConfig) -> Self {
        Self {
            hdiutil: config.hdiutil.clone(),
            installer: config.installer.clone(),
            package_target: config.package_target.clone(),
            mount_root: config.mount_root.clone(),
        }
    }
}

impl SystemPort for MacSystem {
    fn attach(&self, image: &Path) -> Result<CommandOutput> {
        run_command_safe(&AttachArgs {
            hdiutil: self.hdiutil.clone(),
            image: image.to_path_buf(),
            mount_root: self.mount_root.clone(),
        })
    }

    fn detach(&self, device: &str) -> Result<CommandOutput> {
        run_command_safe(&DetachArgs {
            hdiutil: self.hdiutil.clone(),
            device: device.to_string(),
        })
    }

    fn run_installer(&self, package: &Path) -> Result<CommandOutput> {
        run_command_safe(&InstallerArgs {
            installer: self.installer.clone(),
            package: package.to_path_buf(),
            target: self.package_target.clone(),
        })
    }

    fn mount_root(&self) -> &Path {
        &self.mount_root
    }
}
