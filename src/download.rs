//! Fetching the disk image.
//!
//! `file://` URLs and plain paths are copied; everything else is handed to
//! `curl`. Either way the image lands in the download directory as
//! `<stem>-<pid>.dmg`, and a failed fetch leaves nothing behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command_runner::run_command_safe;
use crate::commands::curl::CurlArgs;
use crate::error::DownloadError;

/// Produces a local disk image from a URL.
pub trait Downloader {
    fn download(&self, url: &str) -> Result<PathBuf, DownloadError>;
}

/// Where a URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Local(PathBuf),
    Remote(String),
}

fn classify(url: &str) -> Result<Source, DownloadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DownloadError::InvalidSource(url.to_string()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Source::Local(PathBuf::from(path)));
    }
    if url.contains("://") {
        return Ok(Source::Remote(url.to_string()));
    }
    Ok(Source::Local(PathBuf::from(url)))
}

/// Whether fetching `url` goes through `curl`.
pub fn is_remote(url: &str) -> bool {
    matches!(classify(url), Ok(Source::Remote(_)))
}

/// File stem of the last path segment, ignoring query and fragment.
fn url_stem(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = Path::new(segment)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "-_.".contains(c) { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "download".to_string()
    } else {
        cleaned
    }
}

/// `Downloader` backed by `curl` for remote URLs.
#[derive(Debug, Clone)]
pub struct CurlDownloader {
    curl: PathBuf,
    download_dir: PathBuf,
}

impl CurlDownloader {
    pub fn new(curl: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            curl: curl.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Path the image for `url` is written to.
    pub fn output_path(&self, url: &str) -> PathBuf {
        self.download_dir
            .join(format!("{}-{}.dmg", url_stem(url), std::process::id()))
    }

    fn fetch(&self, url: &str, source: Source, output: &Path) -> Result<(), DownloadError> {
        let failed = |message: String| DownloadError::Failed {
            url: url.to_string(),
            message,
        };

        match source {
            Source::Local(path) => {
                fs::copy(&path, output)
                    .map_err(|e| failed(format!("{}: {}", path.display(), e)))?;
            }
            Source::Remote(remote) => {
                let output = run_command_safe(&CurlArgs {
                    curl: self.curl.clone(),
                    url: remote,
                    output: output.to_path_buf(),
                })
                .map_err(|e| failed(format!("{:#}", e)))?;
                output
                    .ensure_success("curl")
                    .map_err(|e| failed(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl Downloader for CurlDownloader {
    fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let source = classify(url)?;
        fs::create_dir_all(&self.download_dir).map_err(|e| DownloadError::Failed {
            url: url.to_string(),
            message: format!("{}: {}", self.download_dir.display(), e),
        })?;

        let output = self.output_path(url);
        info!(url, output = %output.display(), "downloading");

        if let Err(e) = self.fetch(url, source, &output) {
            if output.exists() {
                if let Err(remove) = fs::remove_file(&output) {
                    warn!("could not remove partial download {}: {}", output.display(), remove);
                }
            }
            return Err(e);
        }

        Ok(output)
    }
}
