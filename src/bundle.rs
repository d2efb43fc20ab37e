//! macOS application bundle metadata.
//!
//! An application bundle is a directory with a `Contents/Info.plist`. The
//! version string a deployment compares against is
//! `CFBundleShortVersionString`, falling back to `CFBundleVersion`.

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::version::SemanticVersion;

const INFO_PLIST: &str = "Contents/Info.plist";

/// Returns true if `path` looks like an application bundle.
///
/// Only the structure is checked; the plist is not parsed.
pub fn is_app_bundle(path: &Path) -> bool {
    path.is_dir() && path.join(INFO_PLIST).is_file()
}

/// An application bundle on disk with its parsed `Info.plist`.
#[derive(Clone, Debug)]
pub struct AppBundle {
    root: PathBuf,
    info_plist: plist::Dictionary,
}

impl AppBundle {
    /// Open an existing bundle.
    ///
    /// Errors if `path` is not a directory or its `Info.plist` is missing
    /// or not a dictionary.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let plist_path = path.join(INFO_PLIST);
        let value = plist::Value::from_file(&plist_path)
            .with_context(|| format!("parsing {}", plist_path.display()))?;
        let info_plist = value
            .into_dictionary()
            .ok_or_else(|| anyhow!("{} is not a dictionary", plist_path.display()))?;

        Ok(Self {
            root: path.to_path_buf(),
            info_plist,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory name including the `.app` suffix.
    pub fn filename(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Obtain an `Info.plist` key as a string, if present and a string.
    pub fn string_key(&self, key: &str) -> Option<String> {
        self.info_plist
            .get(key)
            .and_then(plist::Value::as_string)
            .map(str::to_string)
    }

    /// `CFBundleName`, or the directory name without `.app`.
    pub fn name(&self) -> String {
        self.string_key("CFBundleName").unwrap_or_else(|| {
            self.root
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    pub fn identifier(&self) -> Option<String> {
        self.string_key("CFBundleIdentifier")
    }

    pub fn copyright(&self) -> Option<String> {
        self.string_key("NSHumanReadableCopyright")
    }

    /// `CFBundleVersion`, the build version.
    pub fn version_string(&self) -> Option<String> {
        self.string_key("CFBundleVersion")
    }

    /// `CFBundleShortVersionString`, the marketing version.
    pub fn short_version_string(&self) -> Option<String> {
        self.string_key("CFBundleShortVersionString")
    }

    pub fn version(&self) -> Option<SemanticVersion> {
        parse_logged(self.version_string()?)
    }

    pub fn short_version(&self) -> Option<SemanticVersion> {
        parse_logged(self.short_version_string()?)
    }
}

fn parse_logged(raw: String) -> Option<SemanticVersion> {
    match SemanticVersion::parse(&raw) {
        Ok(version) => Some(version),
        Err(e) => {
            debug!("ignoring bundle version: {}", e);
            None
        }
    }
}

/// Reads the version of whatever is installed at a destination.
pub trait VersionReader {
    /// The embedded version string, or `None` if nothing readable is there.
    fn installed_version(&self, destination: &Path) -> Option<String>;
}

/// `VersionReader` for application bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleVersionReader;

impl VersionReader for BundleVersionReader {
    fn installed_version(&self, destination: &Path) -> Option<String> {
        if !is_app_bundle(destination) {
            return None;
        }
        let bundle = AppBundle::open(destination)
            .map_err(|e| debug!("cannot read {}: {:#}", destination.display(), e))
            .ok()?;
        bundle
            .short_version_string()
            .or_else(|| bundle.version_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Create `dir/name` as an application bundle with the given plist keys.
    pub(crate) fn write_bundle(dir: &Path, name: &str, keys: &[(&str, &str)]) -> PathBuf {
        let root = dir.join(name);
        std::fs::create_dir_all(root.join("Contents/MacOS")).unwrap();
        let mut dict = plist::Dictionary::new();
        for (key, value) in keys {
            dict.insert((*key).to_string(), plist::Value::String((*value).to_string()));
        }
        plist::Value::Dictionary(dict)
            .to_file_xml(root.join(INFO_PLIST))
            .unwrap();
        root
    }

    #[test]
    fn test_open_reads_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bundle(
            dir.path(),
            "Foo.app",
            &[
                ("CFBundleIdentifier", "com.example.foo"),
                ("CFBundleShortVersionString", "3.1.0"),
                ("CFBundleVersion", "3100"),
            ],
        );

        let bundle = AppBundle::open(&path).unwrap();
        assert_eq!(bundle.identifier().as_deref(), Some("com.example.foo"));
        assert_eq!(bundle.short_version().unwrap().to_string(), "3.1.0");
        assert_eq!(bundle.version().unwrap().major(), 3100);
        assert_eq!(bundle.name(), "Foo");
        assert_eq!(bundle.filename(), "Foo.app");
        assert!(bundle.copyright().is_none());
    }

    #[test]
    fn test_is_app_bundle_requires_info_plist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Plain.app/Contents")).unwrap();
        assert!(!is_app_bundle(&dir.path().join("Plain.app")));

        let path = write_bundle(dir.path(), "Real.app", &[]);
        assert!(is_app_bundle(&path));
    }

    #[test]
    fn test_version_reader_falls_back_to_bundle_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bundle(dir.path(), "Foo.app", &[("CFBundleVersion", "12.4")]);
        assert_eq!(
            BundleVersionReader.installed_version(&path).as_deref(),
            Some("12.4")
        );
    }

    #[test]
    fn test_version_reader_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BundleVersionReader
            .installed_version(&dir.path().join("Missing.app"))
            .is_none());

        let path = write_bundle(dir.path(), "NoVersion.app", &[("CFBundleName", "X")]);
        assert!(BundleVersionReader.installed_version(&path).is_none());

        std::fs::write(path.join(INFO_PLIST), "garbage").unwrap();
        assert!(BundleVersionReader.installed_version(&path).is_none());
    }
}
