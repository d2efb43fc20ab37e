//! The disk-image install workflow.
//!
//! `DmgInstaller::run` walks the stages of [`InstallStage`] in order. Every
//! step reports to the `Reporter` as it goes; a failing step records its
//! error and the run carries on into teardown. Once a volume is mounted it
//! is always detached, and a downloaded image is always deleted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bundle::VersionReader;
use crate::download::Downloader;
use crate::error::{DeployError, VerifyError};
use crate::install;
use crate::install_state::{DeployContext, InstallStage, OrchestrationResult};
use crate::mount::{MountHandle, MountManager};
use crate::report::{Badge, Reporter};
use crate::system::SystemPort;
use crate::version::SemanticVersion;
use crate::volume::{self, ArtifactKind, ResolvedArtifact};

/// What to install and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmgInstallRequest {
    pub url: String,
    /// Final path of the installed item; its file name is what the volume
    /// is searched for
    pub destination: PathBuf,
    /// Version expected at the destination afterwards
    pub target_version: Option<String>,
    /// Install even when the installed version is not older
    pub overwrite: bool,
}

/// Outcome of one run.
#[derive(Debug)]
pub struct DeployReport {
    pub result: OrchestrationResult,
    /// Stages entered, in order
    pub stages: Vec<InstallStage>,
    /// Every error reported, with the stage it happened in
    pub errors: Vec<(InstallStage, DeployError)>,
    pub target_version: Option<SemanticVersion>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.result == OrchestrationResult::Success
    }

    pub fn exit_code(&self) -> i32 {
        self.result.exit_code()
    }

    pub fn visited(&self, stage: InstallStage) -> bool {
        self.stages.contains(&stage)
    }

    /// First error reported in `stage`.
    pub fn error_in(&self, stage: InstallStage) -> Option<&DeployError> {
        self.errors
            .iter()
            .find(|(at, _)| *at == stage)
            .map(|(_, error)| error)
    }
}

/// The file name the volume must offer for `destination`.
pub fn expected_filename(destination: &Path) -> Result<String, DeployError> {
    destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DeployError::request(format!(
                "Destination {} has no file name",
                destination.display()
            ))
        })
}

/// Runs disk-image deployments against a set of collaborators.
pub struct DmgInstaller<P, D, V, R> {
    port: P,
    downloader: D,
    versions: V,
    reporter: R,
}

impl<P, D, V, R> DmgInstaller<P, D, V, R>
where
    P: SystemPort,
    D: Downloader,
    V: VersionReader,
    R: Reporter,
{
    pub fn new(port: P, downloader: D, versions: V, reporter: R) -> Self {
        Self {
            port,
            downloader,
            versions,
            reporter,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Run the whole workflow for `request`.
    pub fn run(&mut self, request: &DmgInstallRequest) -> DeployReport {
        let mut ctx = DeployContext::new(&request.destination, request.overwrite);
        info!(url = %request.url, destination = %request.destination.display(), "install dmg");

        self.enter(&mut ctx, InstallStage::UpgradeCheck);
        let expected = match self.upgrade_check(&mut ctx, request) {
            Some(expected) => expected,
            None => return self.finish(ctx),
        };

        self.enter(&mut ctx, InstallStage::Download);
        self.reporter.step("Downloading DMG File");
        let image = match self.downloader.download(&request.url) {
            Ok(image) => {
                self.reporter.badge(Badge::Success);
                image
            }
            Err(e) => {
                self.fail(&mut ctx, Badge::Error, e.into());
                return self.finish(ctx);
            }
        };

        self.enter(&mut ctx, InstallStage::Mount);
        self.reporter.step("Mounting DMG File");
        let mount = match MountManager::new(&self.port).mount(&image) {
            Ok(handle) => {
                self.reporter.badge(Badge::Success);
                Some(handle)
            }
            Err(e) => {
                self.fail(&mut ctx, Badge::Error, e.into());
                None
            }
        };

        if let Some(handle) = &mount {
            self.decide_and_install(&mut ctx, handle, &expected);
            self.verify(&mut ctx);
            self.unmount(&mut ctx, handle);
        }

        self.cleanup(&mut ctx, &image);
        self.finish(ctx)
    }

    /// Returns the expected file name to continue with, or `None` when the
    /// run is already over.
    fn upgrade_check(&mut self, ctx: &mut DeployContext, request: &DmgInstallRequest) -> Option<String> {
        let expected = match expected_filename(&request.destination) {
            Ok(expected) => expected,
            Err(e) => {
                self.reporter.step("Checking Destination");
                self.fail(ctx, Badge::Error, e);
                return None;
            }
        };

        let Some(raw_target) = request.target_version.as_deref() else {
            return Some(expected);
        };

        self.reporter.step("Is Update Needed?");
        let target = match SemanticVersion::parse(raw_target) {
            Ok(target) => target,
            Err(e) => {
                self.fail(ctx, Badge::Error, e.into());
                return None;
            }
        };
        ctx.set_target_version(target.clone());

        let installed = self.installed_version(ctx.destination());
        let satisfied = installed.as_ref().is_some_and(|installed| *installed >= target);
        if satisfied && !ctx.overwrite() {
            self.reporter.badge(Badge::No);
            info!(target = %target, "requested version already installed");
            ctx.set_result(OrchestrationResult::Success);
            return None;
        }

        self.reporter.badge(Badge::Yes);
        Some(expected)
    }

    fn decide_and_install(&mut self, ctx: &mut DeployContext, handle: &MountHandle, expected: &str) {
        self.enter(ctx, InstallStage::Resolve);
        self.reporter.step("Checking DMG for File");
        let Some(artifact) = volume::resolve(&handle.volume, expected) else {
            let error = DeployError::Resolve {
                volume: handle.volume.clone(),
                expected: expected.to_string(),
            };
            self.fail(ctx, Badge::NotFound, error);
            return;
        };
        self.reporter.badge(Badge::Found);
        info!(kind = %artifact.kind(), path = %artifact.path().display(), "artifact resolved");

        self.enter(ctx, InstallStage::CompareOrDecide);
        if !self.compare_or_decide(ctx, &artifact) {
            return;
        }

        self.enter(ctx, InstallStage::Install);
        self.reporter.step(match artifact.kind() {
            ArtifactKind::ApplicationBundle => "Installing APP Bundle",
            ArtifactKind::InstallerPackage => "Installing from PKG",
            ArtifactKind::LooseFile => "Copying File to Destination",
        });
        match install::dispatch(&self.port, &artifact, ctx.destination()) {
            Ok(()) => self.reporter.badge(Badge::Success),
            Err(e) => self.fail(ctx, Badge::Error, e.into()),
        }
    }

    /// Whether the artifact should be installed.
    fn compare_or_decide(&mut self, ctx: &mut DeployContext, artifact: &ResolvedArtifact) -> bool {
        let offered = match artifact {
            ResolvedArtifact::ApplicationBundle {
                short_version: Some(offered),
                ..
            } => offered,
            // Nothing to compare against
            _ => return true,
        };

        if let Some(target) = ctx.target_version() {
            if target != offered {
                let error = DeployError::VersionMismatch {
                    offered: offered.raw().to_string(),
                    target: target.raw().to_string(),
                };
                self.reporter.step("Comparing Versions");
                self.fail(ctx, Badge::NoMatch, error);
                return false;
            }
        }

        ctx.set_target_version(offered.clone());
        self.reporter.step("Is Update Needed?");
        let installed = self.installed_version(ctx.destination());
        let needed = !destination_exists(ctx.destination())
            || ctx.overwrite()
            || installed.as_ref().is_none_or(|installed| offered > installed);

        debug!(
            offered = %offered,
            installed = ?installed.as_ref().map(ToString::to_string),
            needed,
            "install decision"
        );
        self.reporter.badge(if needed { Badge::Yes } else { Badge::No });
        needed
    }

    fn verify(&mut self, ctx: &mut DeployContext) {
        self.enter(ctx, InstallStage::VerifyInstall);
        self.reporter.step("Verifying Installation");

        let destination = ctx.destination().to_path_buf();
        if !destination_exists(&destination) {
            self.fail(ctx, Badge::Error, VerifyError::NotInstalled { destination }.into());
            return;
        }

        if let Some(target) = ctx.target_version().cloned() {
            let error = match self.versions.installed_version(&destination) {
                None => Some(VerifyError::Unreadable {
                    expected: target.raw().to_string(),
                }),
                Some(actual) => match SemanticVersion::parse(&actual) {
                    Ok(installed) if installed == target => None,
                    _ => Some(VerifyError::Mismatch {
                        expected: target.raw().to_string(),
                        actual,
                    }),
                },
            };
            if let Some(error) = error {
                self.fail(ctx, Badge::Error, error.into());
                return;
            }
        }

        self.reporter.badge(Badge::Success);
        ctx.set_result(OrchestrationResult::Success);
    }

    fn unmount(&mut self, ctx: &mut DeployContext, handle: &MountHandle) {
        self.enter(ctx, InstallStage::Unmount);
        self.reporter.step("Unmounting Volume");
        match MountManager::new(&self.port).unmount(handle) {
            Ok(()) => self.reporter.badge(Badge::Success),
            Err(e) => {
                let error = DeployError::from(e);
                self.report(Badge::Error, &error);
                ctx.note_error(error);
            }
        }
    }

    fn cleanup(&mut self, ctx: &mut DeployContext, image: &Path) {
        self.enter(ctx, InstallStage::Cleanup);
        self.reporter.step("Cleaning Up");

        if image.symlink_metadata().is_ok() {
            if let Err(source) = fs::remove_file(image) {
                let error = DeployError::Cleanup {
                    path: image.to_path_buf(),
                    source,
                };
                self.fail(ctx, Badge::Error, error);
                return;
            }
            debug!(image = %image.display(), "download removed");
        }
        self.reporter.badge(Badge::Success);
    }

    fn finish(&mut self, mut ctx: DeployContext) -> DeployReport {
        self.enter(&mut ctx, InstallStage::Terminal);
        // Every path that gets here without a verdict has recorded an error
        if ctx.result() == OrchestrationResult::Continue {
            ctx.set_result(OrchestrationResult::Error);
        }

        let (result, stages, errors, target_version) = ctx.into_parts();
        info!(result = ?result, errors = errors.len(), "install dmg finished");
        DeployReport {
            result,
            stages,
            errors,
            target_version,
        }
    }

    fn enter(&self, ctx: &mut DeployContext, stage: InstallStage) {
        if let Err(e) = ctx.enter(stage) {
            warn!("stage transition rejected: {}", e);
        }
    }

    fn installed_version(&self, destination: &Path) -> Option<SemanticVersion> {
        let raw = self.versions.installed_version(destination)?;
        SemanticVersion::parse(&raw).ok()
    }

    fn report(&mut self, badge: Badge, error: &DeployError) {
        warn!("{}", error);
        self.reporter.badge(badge);
        for line in error.detail_lines() {
            self.reporter.detail(&line);
        }
    }

    fn fail(&mut self, ctx: &mut DeployContext, badge: Badge, error: DeployError) {
        self.report(badge, &error);
        ctx.record_error(error);
    }
}

fn destination_exists(destination: &Path) -> bool {
    destination.symlink_metadata().is_ok()
}
