//! Deployment State Machine
//!
//! Tracks which stage of a disk-image deployment a run is in and what has
//! gone wrong so far.
//!
//! # Stage Flow
//!
//! ```text
//! UpgradeCheck
//!     ↓
//! Download
//!     ↓
//! Mount ──────────────┐ (no volume)
//!     ↓               │
//! Resolve             │
//!     ↓               │
//! CompareOrDecide     │
//!     ↓               │
//! Install             │
//!     ↓               │
//! VerifyInstall       │
//!     ↓               │
//! Unmount             │
//!     ↓               │
//! Cleanup ◄───────────┘
//!     ↓
//! Terminal
//! ```
//!
//! Stages only move forward. Skipping ahead is allowed because a failed
//! decision stage jumps straight to teardown, but a run can never return
//! to an earlier stage.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::error::DeployError;
use crate::version::SemanticVersion;

/// Deployment stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallStage {
    /// Is the requested version already present?
    UpgradeCheck = 0,

    /// Fetch the disk image
    Download = 1,

    /// Attach the image
    Mount = 2,

    /// Find the installable artifact on the volume
    Resolve = 3,

    /// Compare offered, target and installed versions
    CompareOrDecide = 4,

    Install = 5,

    /// Check the destination holds the expected version
    VerifyInstall = 6,

    Unmount = 7,

    /// Delete the downloaded image
    Cleanup = 8,

    /// The run is over
    Terminal = 9,
}

impl InstallStage {
    /// Returns the numeric order of this stage
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::UpgradeCheck => "Upgrade check",
            Self::Download => "Download",
            Self::Mount => "Mount",
            Self::Resolve => "Resolve artifact",
            Self::CompareOrDecide => "Compare versions",
            Self::Install => "Install",
            Self::VerifyInstall => "Verify installation",
            Self::Unmount => "Unmount",
            Self::Cleanup => "Cleanup",
            Self::Terminal => "Finished",
        }
    }

    /// Returns all stages in order
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::UpgradeCheck,
            Self::Download,
            Self::Mount,
            Self::Resolve,
            Self::CompareOrDecide,
            Self::Install,
            Self::VerifyInstall,
            Self::Unmount,
            Self::Cleanup,
            Self::Terminal,
        ]
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    /// Attempted to go backwards (not allowed)
    #[error("Cannot go backwards from {from} to {to} (deployment is forward-only)")]
    BackwardTransition {
        from: InstallStage,
        to: InstallStage,
    },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

/// Verdict passed between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationResult {
    /// Proceed to the next stage
    Continue,
    /// Nothing left to decide; the run succeeded
    Success,
    /// Skip the remaining decision stages but still tear down
    Error,
}

impl OrchestrationResult {
    /// Process exit code for a finished run.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Error => 1,
            Self::Continue | Self::Success => 0,
        }
    }
}

/// Per-run state threaded through every stage.
///
/// Owns the target version so each stage reads and updates it explicitly.
#[derive(Debug)]
pub struct DeployContext {
    current: Option<InstallStage>,
    stage_history: Vec<InstallStage>,
    result: OrchestrationResult,
    errors: Vec<(InstallStage, DeployError)>,
    target_version: Option<SemanticVersion>,
    destination: PathBuf,
    overwrite: bool,
}

impl DeployContext {
    pub fn new(destination: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            current: None,
            stage_history: Vec::with_capacity(InstallStage::all_stages().len()),
            result: OrchestrationResult::Continue,
            errors: Vec::new(),
            target_version: None,
            destination: destination.into(),
            overwrite,
        }
    }

    /// Stages entered so far, in order
    pub fn stage_history(&self) -> &[InstallStage] {
        &self.stage_history
    }

    pub fn visited(&self, stage: InstallStage) -> bool {
        self.stage_history.contains(&stage)
    }

    #[inline]
    pub fn result(&self) -> OrchestrationResult {
        self.result
    }

    pub fn errors(&self) -> &[(InstallStage, DeployError)] {
        &self.errors
    }

    pub fn target_version(&self) -> Option<&SemanticVersion> {
        self.target_version.as_ref()
    }

    pub fn set_target_version(&mut self, version: SemanticVersion) {
        debug!(target = %version, "target version set");
        self.target_version = Some(version);
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[inline]
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Move forward to `target`, possibly skipping stages.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` once the run reached `Terminal`
    /// - `AlreadyAtStage` if `target` is the current stage
    /// - `BackwardTransition` if `target` comes before the current stage
    pub fn enter(&mut self, target: InstallStage) -> Result<InstallStage, InstallTransitionError> {
        if let Some(current) = self.current {
            if current.is_terminal() {
                return Err(InstallTransitionError::FromTerminalState { from: current });
            }
            if target == current {
                return Err(InstallTransitionError::AlreadyAtStage { stage: target });
            }
            if target.order() < current.order() {
                return Err(InstallTransitionError::BackwardTransition {
                    from: current,
                    to: target,
                });
            }
        }

        debug!(stage = %target, "entering stage");
        self.stage_history.push(target);
        self.current = Some(target);
        Ok(target)
    }

    /// Record a failure in the current stage. The run result becomes
    /// `Error` and stays there.
    pub fn record_error(&mut self, error: DeployError) {
        let stage = self.current.unwrap_or(InstallStage::UpgradeCheck);
        debug!(stage = %stage, error = %error, "stage failed");
        self.result = OrchestrationResult::Error;
        self.errors.push((stage, error));
    }

    /// Record a failure that is reported but leaves the result alone.
    pub fn note_error(&mut self, error: DeployError) {
        let stage = self.current.unwrap_or(InstallStage::UpgradeCheck);
        debug!(stage = %stage, error = %error, "stage failed, result unchanged");
        self.errors.push((stage, error));
    }

    /// Set a non-error verdict. An earlier error is never cleared.
    pub fn set_result(&mut self, result: OrchestrationResult) {
        if self.result != OrchestrationResult::Error {
            self.result = result;
        }
    }

    /// Consume the context into the values a caller keeps.
    pub fn into_parts(
        self,
    ) -> (
        OrchestrationResult,
        Vec<InstallStage>,
        Vec<(InstallStage, DeployError)>,
        Option<SemanticVersion>,
    ) {
        (
            self.result,
            self.stage_history,
            self.errors,
            self.target_version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MountError;

    #[test]
    fn test_stage_order_is_sequential() {
        for (i, stage) in InstallStage::all_stages().iter().enumerate() {
            assert_eq!(stage.order() as usize, i, "Stage {:?} should have order {}", stage, i);
        }
    }

    #[test]
    fn test_only_terminal_is_terminal() {
        let terminal: Vec<_> = InstallStage::all_stages()
            .iter()
            .filter(|stage| stage.is_terminal())
            .collect();
        assert_eq!(terminal, vec![&InstallStage::Terminal]);
    }

    #[test]
    fn test_forward_skip_allowed() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", false);
        ctx.enter(InstallStage::UpgradeCheck).unwrap();
        ctx.enter(InstallStage::Download).unwrap();
        ctx.enter(InstallStage::Mount).unwrap();
        ctx.enter(InstallStage::Cleanup).unwrap();
        ctx.enter(InstallStage::Terminal).unwrap();

        assert_eq!(
            ctx.stage_history(),
            &[
                InstallStage::UpgradeCheck,
                InstallStage::Download,
                InstallStage::Mount,
                InstallStage::Cleanup,
                InstallStage::Terminal,
            ]
        );
        assert!(!ctx.visited(InstallStage::Unmount));
    }

    #[test]
    fn test_backward_and_repeat_rejected() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", false);
        ctx.enter(InstallStage::Install).unwrap();

        assert_eq!(
            ctx.enter(InstallStage::Mount),
            Err(InstallTransitionError::BackwardTransition {
                from: InstallStage::Install,
                to: InstallStage::Mount,
            })
        );
        assert_eq!(
            ctx.enter(InstallStage::Install),
            Err(InstallTransitionError::AlreadyAtStage {
                stage: InstallStage::Install
            })
        );
    }

    #[test]
    fn test_terminal_is_final() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", false);
        ctx.enter(InstallStage::Terminal).unwrap();
        assert!(matches!(
            ctx.enter(InstallStage::Terminal),
            Err(InstallTransitionError::FromTerminalState { .. })
        ));
    }

    #[test]
    fn test_error_is_sticky() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", false);
        ctx.enter(InstallStage::Mount).unwrap();
        ctx.record_error(MountError::NoMountPoint.into());
        ctx.set_result(OrchestrationResult::Success);

        assert_eq!(ctx.result(), OrchestrationResult::Error);
        assert_eq!(ctx.errors()[0].0, InstallStage::Mount);
        assert_eq!(ctx.result().exit_code(), 1);
    }

    #[test]
    fn test_noted_error_keeps_result() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", false);
        ctx.enter(InstallStage::VerifyInstall).unwrap();
        ctx.set_result(OrchestrationResult::Success);
        ctx.enter(InstallStage::Unmount).unwrap();
        ctx.note_error(MountError::NoMountPoint.into());

        assert_eq!(ctx.result(), OrchestrationResult::Success);
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].0, InstallStage::Unmount);
    }

    #[test]
    fn test_success_without_errors() {
        let mut ctx = DeployContext::new("/Applications/Foo.app", true);
        ctx.set_result(OrchestrationResult::Success);
        assert_eq!(ctx.result(), OrchestrationResult::Success);
        assert_eq!(ctx.result().exit_code(), 0);
        assert!(ctx.overwrite());
        assert!(ctx.errors().is_empty());
    }
}
