//! Type-safe arguments for `/usr/sbin/installer`.

use std::path::{Path, PathBuf};

use crate::command_traits::CommandArgs;

/// Arguments for `installer -pkg <package> -target <volume>`.
///
/// `target` is a volume path (usually `/`), not the application path.
#[derive(Debug, Clone)]
pub struct InstallerArgs {
    pub installer: PathBuf,
    pub package: PathBuf,
    pub target: PathBuf,
}

impl CommandArgs for InstallerArgs {
    fn program(&self) -> &Path {
        &self.installer
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-pkg".to_string(),
            self.package.display().to_string(),
            "-target".to_string(),
            self.target.display().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installer_args() {
        let args = InstallerArgs {
            installer: PathBuf::from("/usr/sbin/installer"),
            package: PathBuf::from("/Volumes/Foo/Foo Installer.pkg"),
            target: PathBuf::from("/"),
        };
        assert_eq!(
            args.to_cli_args(),
            vec!["-pkg", "/Volumes/Foo/Foo Installer.pkg", "-target", "/"]
        );
    }
}
