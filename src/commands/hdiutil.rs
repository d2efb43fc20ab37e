//! Type-safe arguments for `hdiutil attach` and `hdiutil detach`.
//!
//! # Flag Reference
//!
//! | Struct | Invocation |
//! |--------|------------|
//! | `AttachArgs` | `hdiutil attach <image> -nobrowse [-mountroot <dir>]` |
//! | `DetachArgs` | `hdiutil detach /dev/<node> -quiet` |
//!
//! `-nobrowse` keeps the volume out of Finder. `-mountroot` is only passed
//! when volumes should appear somewhere other than `/Volumes`.

use std::path::{Path, PathBuf};

use crate::command_traits::CommandArgs;

/// Default directory hdiutil mounts volumes under.
pub const DEFAULT_MOUNT_ROOT: &str = "/Volumes";

/// Arguments for `hdiutil attach`.
#[derive(Debug, Clone)]
pub struct AttachArgs {
    pub hdiutil: PathBuf,
    /// Disk image to attach
    pub image: PathBuf,
    /// Directory the volume is mounted under
    pub mount_root: PathBuf,
}

impl CommandArgs for AttachArgs {
    fn program(&self) -> &Path {
        &self.hdiutil
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "attach".to_string(),
            self.image.display().to_string(),
            "-nobrowse".to_string(),
        ];
        if self.mount_root != Path::new(DEFAULT_MOUNT_ROOT) {
            args.push("-mountroot".to_string());
            args.push(self.mount_root.display().to_string());
        }
        args
    }
}

/// Arguments for `hdiutil detach`.
#[derive(Debug, Clone)]
pub struct DetachArgs {
    pub hdiutil: PathBuf,
    /// Device node without the `/dev/` prefix, e.g. `disk4s1`
    pub device: String,
}

impl CommandArgs for DetachArgs {
    fn program(&self) -> &Path {
        &self.hdiutil
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "detach".to_string(),
            format!("/dev/{}", self.device),
            "-quiet".to_string(),
        ]
    }
}
