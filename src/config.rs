//! Deployment configuration.
//!
//! Tool locations and the download directory. Everything has a default
//! that matches a stock macOS install, so a config file is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::hdiutil::DEFAULT_MOUNT_ROOT;

/// Configuration that can be loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Where downloaded disk images are written
    pub download_dir: PathBuf,
    pub hdiutil: PathBuf,
    pub installer: PathBuf,
    pub curl: PathBuf,
    /// Volume passed to `installer -target`
    pub package_target: PathBuf,
    /// Directory attached volumes appear under
    pub mount_root: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir(),
            hdiutil: PathBuf::from("/usr/bin/hdiutil"),
            installer: PathBuf::from("/usr/sbin/installer"),
            curl: PathBuf::from("/usr/bin/curl"),
            package_target: PathBuf::from("/"),
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
        }
    }
}

impl DeployConfig {
    /// Load configuration from a JSON file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let tools = [
            ("hdiutil", &self.hdiutil),
            ("installer", &self.installer),
            ("curl", &self.curl),
        ];
        for (name, path) in tools {
            if path.as_os_str().is_empty() {
                anyhow::bail!("Path to {} must be specified", name);
            }
        }

        if self.download_dir.as_os_str().is_empty() {
            anyhow::bail!("Download directory must be specified");
        }
        if !self.package_target.is_absolute() {
            anyhow::bail!(
                "Package target must be an absolute volume path, got {:?}",
                self.package_target
            );
        }
        if !self.mount_root.is_absolute() {
            anyhow::bail!(
                "Mount root must be an absolute path, got {:?}",
                self.mount_root
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeployConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mount_root, PathBuf::from("/Volumes"));
        assert_eq!(config.package_target, PathBuf::from("/"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macdeploy.json");
        fs::write(&path, r#"{ "download_dir": "/var/tmp/deploy" }"#).unwrap();

        let config = DeployConfig::load_from_file(&path).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/var/tmp/deploy"));
        assert_eq!(config.hdiutil, PathBuf::from("/usr/bin/hdiutil"));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macdeploy.json");
        fs::write(&path, "{ not json").unwrap();

        let err = DeployConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration JSON"));
    }

    #[test]
    fn test_relative_package_target_is_rejected() {
        let config = DeployConfig {
            package_target: PathBuf::from("Macintosh HD"),
            ..DeployConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_tool_path_is_rejected() {
        let config = DeployConfig {
            installer: PathBuf::new(),
            ..DeployConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Path to installer must be specified");
    }
}
