//! Install strategies, one per artifact kind.
//!
//! Bundle and file installs never write into the destination directly.
//! The new copy is built next to the destination and renamed into place,
//! so a failed copy leaves the previous install untouched.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::InstallError;
use crate::system::SystemPort;
use crate::volume::ResolvedArtifact;

/// Install `artifact` to `destination` with the strategy its kind needs.
pub fn dispatch<P: SystemPort>(
    port: &P,
    artifact: &ResolvedArtifact,
    destination: &Path,
) -> Result<(), InstallError> {
    match artifact {
        ResolvedArtifact::ApplicationBundle { path, .. } => install_bundle(path, destination),
        ResolvedArtifact::InstallerPackage { path } => install_package(port, path),
        ResolvedArtifact::LooseFile { path } => install_file(path, destination),
    }
}

/// Replace `destination` with a copy of the bundle at `source`.
pub fn install_bundle(source: &Path, destination: &Path) -> Result<(), InstallError> {
    swap_in_tree(source, destination)?;
    info!(destination = %destination.display(), "bundle installed");
    Ok(())
}

/// Copy `source` into a staging directory next to `destination`, then
/// rename it into place. The previous destination is restored if the
/// final rename fails.
fn swap_in_tree(source: &Path, destination: &Path) -> Result<(), InstallError> {
    let parent = parent_dir(destination)?;
    fs::create_dir_all(parent).map_err(|e| {
        InstallError::message(format!("Cannot create {}: {}", parent.display(), e))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".macdeploy-")
        .tempdir_in(parent)
        .map_err(|e| {
            InstallError::message(format!(
                "Cannot create staging directory in {}: {}",
                parent.display(),
                e
            ))
        })?;

    let staged = staging.path().join("new");
    copy_tree(source, &staged)?;
    debug!(staged = %staged.display(), "tree staged");

    let previous = staging.path().join("previous");
    let had_previous = destination.symlink_metadata().is_ok();
    if had_previous {
        fs::rename(destination, &previous).map_err(|e| {
            InstallError::message(format!(
                "Cannot move existing {} aside: {}",
                destination.display(),
                e
            ))
        })?;
    }

    if let Err(e) = fs::rename(&staged, destination) {
        let mut diagnostics = vec![format!(
            "Cannot move new copy to {}: {}",
            destination.display(),
            e
        )];
        if had_previous {
            if let Err(restore) = fs::rename(&previous, destination) {
                warn!("failed to restore previous copy: {}", restore);
                diagnostics.push(format!(
                    "Previous version could not be restored: {}",
                    restore
                ));
            }
        }
        return Err(InstallError::new(diagnostics));
    }

    // Dropping `staging` removes the previous copy
    Ok(())
}

/// Run the OS package installer on `package`.
pub fn install_package<P: SystemPort>(port: &P, package: &Path) -> Result<(), InstallError> {
    let output = port
        .run_installer(package)
        .map_err(|e| InstallError::message(format!("{:#}", e)))?;

    if output.success {
        info!(package = %package.display(), "package installed");
        return Ok(());
    }

    let mut diagnostics = output.diagnostic_lines();
    if diagnostics.is_empty() {
        diagnostics.push(format!(
            "installer exited with code {}",
            output.exit_code.unwrap_or(-1)
        ));
    }
    Err(InstallError::new(diagnostics))
}

/// Copy the file or directory at `source` over `destination`.
pub fn install_file(source: &Path, destination: &Path) -> Result<(), InstallError> {
    if source.is_dir() {
        swap_in_tree(source, destination)?;
        info!(destination = %destination.display(), "directory installed");
        return Ok(());
    }

    let parent = parent_dir(destination)?;
    fs::create_dir_all(parent).map_err(|e| {
        InstallError::message(format!("Cannot create {}: {}", parent.display(), e))
    })?;

    let temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
        InstallError::message(format!(
            "Cannot create temporary file in {}: {}",
            parent.display(),
            e
        ))
    })?;

    fs::copy(source, temp.path()).map_err(|e| {
        InstallError::message(format!("Cannot copy {}: {}", source.display(), e))
    })?;

    temp.persist(destination).map_err(|e| {
        InstallError::message(format!("Cannot write {}: {}", destination.display(), e.error))
    })?;

    info!(destination = %destination.display(), "file installed");
    Ok(())
}

fn parent_dir(destination: &Path) -> Result<&Path, InstallError> {
    destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| {
            InstallError::message(format!(
                "Destination {} has no parent directory",
                destination.display()
            ))
        })
}

/// Recursively copy a directory tree, keeping symlinks as symlinks.
///
/// Directory permissions are applied last so read-only directories can
/// still be filled.
fn copy_tree(source: &Path, target: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::symlink;

    let mut directories = Vec::new();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| InstallError::message(format!("Cannot read {}: {}", source.display(), e)))?;
        let relative = entry.path().strip_prefix(source).map_err(|e| {
            InstallError::message(format!("{}: {}", entry.path().display(), e))
        })?;
        let dest = target.join(relative);
        let file_type = entry.file_type();

        let result = if file_type.is_dir() {
            entry
                .metadata()
                .map_err(std::io::Error::other)
                .and_then(|metadata| {
                    directories.push((dest.clone(), metadata.permissions()));
                    fs::create_dir_all(&dest)
                })
        } else if file_type.is_symlink() {
            fs::read_link(entry.path()).and_then(|link| symlink(link, &dest))
        } else {
            fs::copy(entry.path(), &dest).map(|_| ())
        };

        result.map_err(|e| {
            InstallError::message(format!("Cannot copy {}: {}", entry.path().display(), e))
        })?;
    }

    for (dir, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&dir, permissions).map_err(|e| {
            InstallError::message(format!("Cannot set permissions on {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}
