//! Error handling module for macdeploy
//!
//! Every step of a disk-image deployment has its own error type. The
//! orchestrator captures them as `DeployError` values, reports them, and
//! keeps going into teardown; nothing here is meant to unwind past it.

use std::path::PathBuf;

use thiserror::Error;

use crate::version::MalformedVersion;

/// Attaching the disk image failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    /// hdiutil could not be started
    #[error("Could not run hdiutil attach: {0}")]
    Spawn(String),

    /// hdiutil exited non-zero; carries its stderr
    #[error("{}", .0.trim())]
    Attach(String),

    /// hdiutil succeeded but printed no mounted volume
    #[error("Could not determine mount point")]
    NoMountPoint,
}

/// Detaching the disk image failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnmountError {
    #[error("Could not run hdiutil detach: {0}")]
    Spawn(String),

    #[error("{}", .0.trim())]
    Detach(String),

    /// The volume path did not disappear within the poll budget
    #[error("Volume still exists after unmount")]
    StillMounted { volume: PathBuf, polls: u32 },
}

/// Fetching the disk image failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Invalid download source '{0}'")]
    InvalidSource(String),

    #[error("Download of {url} failed: {message}")]
    Failed { url: String, message: String },
}

/// An install strategy failed. Each diagnostic line is kept separately so
/// the reporter can print them one per line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Installation failed")]
pub struct InstallError {
    pub diagnostics: Vec<String>,
}

impl InstallError {
    pub fn new(diagnostics: Vec<String>) -> Self {
        Self { diagnostics }
    }

    /// Single-line failure.
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![msg.into()],
        }
    }
}

/// The destination does not hold what the run expected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Application not found at destination: {}", .destination.display())]
    NotInstalled { destination: PathBuf },

    #[error("New Version ({actual}) != Target Version ({expected})!")]
    Mismatch { expected: String, actual: String },

    #[error("Cannot read new version number!")]
    Unreadable { expected: String },
}

/// Every error a deployment run can report.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Invalid request: {0}")]
    Request(String),

    #[error(transparent)]
    Version(#[from] MalformedVersion),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Unmount(#[from] UnmountError),

    /// Nothing on the volume matched
    #[error("No installable artifact for '{expected}' on {}", .volume.display())]
    Resolve { volume: PathBuf, expected: String },

    /// The payload on the volume is not the version the caller asked for
    #[error("Offered version {offered} does not match target version {target}")]
    VersionMismatch { offered: String, target: String },

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The downloaded image could not be deleted
    #[error("Download could not be removed: {}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Create a request validation error
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Lines to show under the failing step.
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            Self::Install(err) if !err.diagnostics.is_empty() => err.diagnostics.clone(),
            other => vec![other.to_string()],
        }
    }
}
