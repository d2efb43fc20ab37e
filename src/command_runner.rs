//! Type-Safe Command Execution
//!
//! Every external tool macdeploy runs goes through `run_command_safe`:
//!
//! - Process group isolation, so a signal reaches the whole tool tree
//! - PID registration with `ChildRegistry` for cleanup on interrupt
//! - Type-safe argument passing via the `CommandArgs` trait
//! - stdout and stderr captured for parsing and diagnostics

use crate::command_traits::CommandArgs;
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Execute a tool with type-safe arguments and wait for it to exit.
///
/// # Returns
///
/// - `Ok(output)` - The tool ran; check `output.success` for its verdict
/// - `Err` - The tool could not be spawned or waited on
pub fn run_command_safe<T: CommandArgs>(args: &T) -> Result<CommandOutput> {
    let name = args.display_name();
    let cli_args = args.to_cli_args();

    info!(program = %args.program().display(), args = ?cli_args, "run_command_safe");

    let child = Command::new(args.program())
        .args(&cli_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group()
        .spawn()
        .with_context(|| format!("Failed to spawn {}", args.program().display()))?;
    let pid = child.id();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let output = child.wait_with_output();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }

    let output = output.with_context(|| format!("Failed waiting for {}", name))?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        success: output.status.success(),
    };

    if result.success {
        debug!("{} exited successfully", name);
    } else {
        info!(
            "{} failed with exit code {}",
            name,
            result.exit_code.unwrap_or(-1)
        );
    }

    Ok(result)
}

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// A successful run that printed `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            success: true,
            ..Self::default()
        }
    }

    /// A failed run that printed `stderr`.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
            ..Self::default()
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            anyhow::bail!(
                "{} failed (exit code {}): {}",
                context,
                self.exit_code.unwrap_or(-1),
                self.stderr.trim()
            )
        }
    }

    /// Non-empty lines of stdout followed by stderr.
    pub fn diagnostic_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}
