//! Pre-flight sanity checks for runtime environment
//!
//! Before a deployment starts this module verifies that:
//! - The configured `hdiutil` and `installer` binaries exist, plus `curl`
//!   when the image has to be fetched from a remote URL
//! - We know whether we run with root privileges (EUID 0)
//!
//! Missing binaries abort the run before anything is downloaded. Not being
//! root only produces a warning, since bundle and file installs into
//! user-writable locations work without it.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::DeployConfig;
use crate::download;

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<PathBuf>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if every required binary is present
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty()
    }
}

fn binary_exists(path: &Path) -> bool {
    path.is_file()
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks for deploying `url` with `config`
pub fn verify_environment(config: &DeployConfig, url: &str) -> SanityCheckResult {
    let mut required = vec![&config.hdiutil, &config.installer];
    if download::is_remote(url) {
        required.push(&config.curl);
    }

    let missing_binaries = required
        .into_iter()
        .filter(|binary| !binary_exists(binary))
        .cloned()
        .collect();

    SanityCheckResult {
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

/// Human-readable report for a failed check.
pub fn failure_message(result: &SanityCheckResult) -> String {
    let mut message = String::from("Pre-flight check failed: missing required binaries");
    for binary in &result.missing_binaries {
        message.push_str(&format!("\n  • {}", binary.display()));
    }
    message.push_str("\nAdjust the tool paths in the configuration file and try again.");
    message
}

/// Verify the environment, returning the failure report on error.
pub fn run_preflight_checks(config: &DeployConfig, url: &str) -> Result<(), String> {
    debug!("Running pre-flight sanity checks...");

    let result = verify_environment(config, url);
    if !result.is_ok() {
        return Err(failure_message(&result));
    }

    if !result.is_root {
        warn!("Not running as root; package installs will likely fail");
    }
    info!("Pre-flight checks passed: root={}", result.is_root);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(tool: &Path) -> DeployConfig {
        DeployConfig {
            hdiutil: tool.to_path_buf(),
            installer: tool.to_path_buf(),
            curl: tool.to_path_buf(),
            ..DeployConfig::default()
        }
    }

    #[test]
    fn test_binary_exists_sh() {
        assert!(binary_exists(Path::new("/bin/sh")), "sh should be available");
    }

    #[test]
    fn test_binary_exists_nonexistent() {
        assert!(!binary_exists(Path::new("/nonexistent/this_binary_does_not_exist")));
        // A directory is not a binary
        assert!(!binary_exists(Path::new("/")));
    }

    const REMOTE: &str = "https://example.com/Foo.dmg";

    #[test]
    fn test_verify_environment_all_present() {
        let result = verify_environment(&config_with(Path::new("/bin/sh")), REMOTE);
        assert!(result.is_ok());
        assert!(run_preflight_checks(&config_with(Path::new("/bin/sh")), REMOTE).is_ok());
    }

    #[test]
    fn test_verify_environment_reports_missing() {
        let mut config = config_with(Path::new("/bin/sh"));
        config.curl = PathBuf::from("/nonexistent/curl");

        let result = verify_environment(&config, REMOTE);
        assert_eq!(result.missing_binaries, vec![PathBuf::from("/nonexistent/curl")]);

        let message = run_preflight_checks(&config, REMOTE).unwrap_err();
        assert!(message.contains("/nonexistent/curl"));
    }

    #[test]
    fn test_local_source_does_not_need_curl() {
        let mut config = config_with(Path::new("/bin/sh"));
        config.curl = PathBuf::from("/nonexistent/curl");

        assert!(verify_environment(&config, "file:///tmp/Foo.dmg").is_ok());
        assert!(verify_environment(&config, "/tmp/Foo.dmg").is_ok());
        assert!(run_preflight_checks(&config, "/tmp/Foo.dmg").is_ok());
    }

    #[test]
    fn test_local_source_still_needs_hdiutil() {
        let mut config = config_with(Path::new("/bin/sh"));
        config.hdiutil = PathBuf::from("/nonexistent/hdiutil");
        config.curl = PathBuf::from("/nonexistent/curl");

        let result = verify_environment(&config, "/tmp/Foo.dmg");
        assert_eq!(result.missing_binaries, vec![PathBuf::from("/nonexistent/hdiutil")]);
    }

    #[test]
    fn test_sanity_result_ignores_root() {
        let not_root = SanityCheckResult {
            missing_binaries: vec![],
            is_root: false,
        };
        assert!(not_root.is_ok());
    }
}
