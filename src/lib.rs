//! macdeploy Library
//!
//! Disk-image deployment for macOS: fetch a DMG, mount it, find the
//! payload, decide whether it needs installing, install it, verify the
//! result and clean up after itself.

pub mod bundle;
pub mod cli;
pub mod command_runner;
pub mod command_traits;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod info;
pub mod install;
pub mod install_state;
pub mod mount;
pub mod orchestrator;
pub mod process_guard;
pub mod report;
pub mod sanity;
pub mod system;
pub mod version;
pub mod volume;

// Re-export main types for convenience
pub use bundle::{AppBundle, BundleVersionReader, VersionReader};
pub use command_runner::{CommandOutput, run_command_safe};
pub use command_traits::CommandArgs;
pub use config::DeployConfig;
pub use download::{CurlDownloader, Downloader};
pub use error::{
    DeployError, DownloadError, InstallError, MountError, UnmountError, VerifyError,
};
pub use install_state::{DeployContext, InstallStage, InstallTransitionError, OrchestrationResult};
pub use mount::{MountHandle, MountManager, parse_attach_output};
pub use orchestrator::{DeployReport, DmgInstallRequest, DmgInstaller};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use report::{Badge, ConsoleReporter, Reporter};
pub use system::{MacSystem, SystemPort};
pub use version::{MalformedVersion, SemanticVersion};
pub use volume::{ArtifactKind, ResolvedArtifact};
