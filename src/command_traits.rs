//! Type-safe external command contracts.
//!
//! Each macOS tool this crate drives (`hdiutil`, `installer`, `curl`) gets
//! a struct implementing `CommandArgs`. The struct definition is the
//! contract: flag spelling lives in one place and the runner never builds
//! argument vectors by hand.

use std::path::Path;

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: Absolute path of the binary to execute.
/// - `to_cli_args()`: Arguments exactly as the tool expects them, without
///   the program itself.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use macdeploy::command_traits::CommandArgs;
/// use macdeploy::commands::hdiutil::DetachArgs;
///
/// let args = DetachArgs {
///     hdiutil: PathBuf::from("/usr/bin/hdiutil"),
///     device: "disk4s1".to_string(),
/// };
///
/// assert_eq!(args.to_cli_args(), vec!["detach", "/dev/disk4s1", "-quiet"]);
/// ```
pub trait CommandArgs {
    /// Binary to execute.
    fn program(&self) -> &Path;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Short name used in logs and error messages.
    fn display_name(&self) -> String {
        self.program()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program().display().to_string())
    }
}
