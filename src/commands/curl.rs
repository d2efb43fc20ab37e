//! Type-safe arguments for fetching a disk image with `curl`.

use std::path::{Path, PathBuf};

use crate::command_traits::CommandArgs;

/// Arguments for `curl -fsSL --retry 3 -o <output> <url>`.
///
/// `-f` makes HTTP errors a non-zero exit instead of saving the error page.
#[derive(Debug, Clone)]
pub struct CurlArgs {
    pub curl: PathBuf,
    pub url: String,
    pub output: PathBuf,
}

impl CommandArgs for CurlArgs {
    fn program(&self) -> &Path {
        &self.curl
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-fsSL".to_string(),
            "--retry".to_string(),
            "3".to_string(),
            "-o".to_string(),
            self.output.display().to_string(),
            self.url.clone(),
        ]
    }
}
