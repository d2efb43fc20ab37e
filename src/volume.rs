//! Finding the installable payload on a mounted volume.
//!
//! Only the top level of the volume is examined. Rules, first match wins:
//!
//! 1. An entry named like the destination that is an application bundle
//! 2. The only `.pkg` on the volume (none or several means no match)
//! 3. Any entry named like the destination, installed as a plain file
//!
//! Hidden entries (`.background`, `.DS_Store`, ...) are never candidates.

use std::fs;
use std::path::{Path, PathBuf};

use strum::Display;
use tracing::{debug, warn};

use crate::bundle::{AppBundle, is_app_bundle};
use crate::version::SemanticVersion;

/// Which install strategy an artifact needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArtifactKind {
    #[strum(serialize = "APP Bundle")]
    ApplicationBundle,
    #[strum(serialize = "PKG")]
    InstallerPackage,
    #[strum(serialize = "File")]
    LooseFile,
}

/// Something on the volume that can be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArtifact {
    ApplicationBundle {
        path: PathBuf,
        short_version: Option<SemanticVersion>,
    },
    InstallerPackage {
        path: PathBuf,
    },
    LooseFile {
        path: PathBuf,
    },
}

impl ResolvedArtifact {
    pub fn path(&self) -> &Path {
        match self {
            Self::ApplicationBundle { path, .. }
            | Self::InstallerPackage { path }
            | Self::LooseFile { path } => path,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::ApplicationBundle { .. } => ArtifactKind::ApplicationBundle,
            Self::InstallerPackage { .. } => ArtifactKind::InstallerPackage,
            Self::LooseFile { .. } => ArtifactKind::LooseFile,
        }
    }
}

/// Resolve the payload on `volume` for a destination named
/// `expected_filename`.
pub fn resolve(volume: &Path, expected_filename: &str) -> Option<ResolvedArtifact> {
    let entries = match top_level_entries(volume) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(volume = %volume.display(), error = %e, "cannot list volume");
            return None;
        }
    };

    let matching = entries
        .iter()
        .find(|path| path.file_name().is_some_and(|name| name == expected_filename));

    if let Some(path) = matching.filter(|path| is_app_bundle(path)) {
        let short_version = AppBundle::open(path)
            .map_err(|e| warn!("cannot read bundle {}: {:#}", path.display(), e))
            .ok()
            .and_then(|bundle| bundle.short_version());
        debug!(path = %path.display(), "resolved application bundle");
        return Some(ResolvedArtifact::ApplicationBundle {
            path: path.clone(),
            short_version,
        });
    }

    let packages: Vec<&PathBuf> = entries
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "pkg"))
        .collect();
    if let [package] = packages.as_slice() {
        debug!(path = %package.display(), "resolved installer package");
        return Some(ResolvedArtifact::InstallerPackage {
            path: (*package).clone(),
        });
    }
    if packages.len() > 1 {
        debug!(count = packages.len(), "several packages on volume, not guessing");
    }

    matching.map(|path| {
        debug!(path = %path.display(), "resolved loose file");
        ResolvedArtifact::LooseFile { path: path.clone() }
    })
}

/// Visible top-level entries, sorted by name.
fn top_level_entries(volume: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(volume)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::write_bundle;

    #[test]
    fn test_bundle_has_priority_over_single_package() {
        let volume = tempfile::tempdir().unwrap();
        write_bundle(
            volume.path(),
            "Foo.app",
            &[("CFBundleShortVersionString", "3.1.0")],
        );
        fs::write(volume.path().join("Other.pkg"), b"xar!").unwrap();

        let artifact = resolve(volume.path(), "Foo.app").unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::ApplicationBundle);
        match artifact {
            ResolvedArtifact::ApplicationBundle { short_version, .. } => {
                assert_eq!(short_version.unwrap().to_string(), "3.1.0");
            }
            other => panic!("unexpected artifact {:?}", other),
        }
    }

    #[test]
    fn test_single_package() {
        let volume = tempfile::tempdir().unwrap();
        fs::write(volume.path().join("Foo Installer.pkg"), b"xar!").unwrap();
        fs::write(volume.path().join("README.txt"), b"hi").unwrap();

        let artifact = resolve(volume.path(), "Foo.app").unwrap();
        assert_eq!(
            artifact,
            ResolvedArtifact::InstallerPackage {
                path: volume.path().join("Foo Installer.pkg")
            }
        );
    }

    #[test]
    fn test_two_packages_resolve_to_nothing() {
        let volume = tempfile::tempdir().unwrap();
        fs::write(volume.path().join("A.pkg"), b"xar!").unwrap();
        fs::write(volume.path().join("B.pkg"), b"xar!").unwrap();

        assert!(resolve(volume.path(), "Foo.app").is_none());
    }

    #[test]
    fn test_two_packages_fall_back_to_loose_file() {
        let volume = tempfile::tempdir().unwrap();
        fs::write(volume.path().join("A.pkg"), b"xar!").unwrap();
        fs::write(volume.path().join("B.pkg"), b"xar!").unwrap();
        fs::write(volume.path().join("foo.conf"), b"key=value").unwrap();

        let artifact = resolve(volume.path(), "foo.conf").unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::LooseFile);
        assert_eq!(artifact.path(), volume.path().join("foo.conf"));
    }

    #[test]
    fn test_directory_without_plist_is_loose_file() {
        let volume = tempfile::tempdir().unwrap();
        fs::create_dir(volume.path().join("Fonts")).unwrap();

        let artifact = resolve(volume.path(), "Fonts").unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::LooseFile);
    }

    #[test]
    fn test_hidden_entries_ignored() {
        let volume = tempfile::tempdir().unwrap();
        fs::write(volume.path().join(".hidden.pkg"), b"xar!").unwrap();

        assert!(resolve(volume.path(), ".hidden.pkg").is_none());
    }

    #[test]
    fn test_bundle_with_bad_version_still_resolves() {
        let volume = tempfile::tempdir().unwrap();
        write_bundle(
            volume.path(),
            "Foo.app",
            &[("CFBundleShortVersionString", "latest")],
        );

        match resolve(volume.path(), "Foo.app").unwrap() {
            ResolvedArtifact::ApplicationBundle { short_version, .. } => {
                assert!(short_version.is_none())
            }
            other => panic!("unexpected artifact {:?}", other),
        }
    }

    #[test]
    fn test_missing_volume() {
        assert!(resolve(Path::new("/nonexistent/volume"), "Foo.app").is_none());
    }
}
