//! `info app`: read-only facts about an application bundle.
//!
//! Keys are `name`, `identifier`, `path`, `filename`, `copyright`,
//! `version` and `short_version`. Versions can be narrowed further with a
//! dotted sub-key such as `short_version.major`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::bundle::{AppBundle, is_app_bundle};
use crate::version::SemanticVersion;

#[derive(Error, Debug)]
pub enum InfoError {
    #[error("No Application Found")]
    NotFound(PathBuf),

    #[error("Unknown key '{0}'")]
    UnknownKey(String),

    #[error("Cannot read application: {0:#}")]
    Unreadable(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AppKey {
    Name,
    Identifier,
    Path,
    Filename,
    Copyright,
    Version,
    ShortVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum VersionKey {
    Raw,
    Full,
    Major,
    Minor,
    Revision,
    Prerelease,
    Build,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub raw: String,
    pub full: String,
    pub major: u64,
    pub minor: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
    pub build: u64,
}

impl From<&SemanticVersion> for VersionInfo {
    fn from(version: &SemanticVersion) -> Self {
        Self {
            raw: version.raw().to_string(),
            full: version.to_string(),
            major: version.major(),
            minor: version.minor(),
            revision: version.revision(),
            prerelease: version.pre_release().map(str::to_string),
            build: version.build(),
        }
    }
}

impl VersionInfo {
    fn get(&self, key: VersionKey) -> Value {
        match key {
            VersionKey::Raw => Value::from(self.raw.as_str()),
            VersionKey::Full => Value::from(self.full.as_str()),
            VersionKey::Major => Value::from(self.major),
            VersionKey::Minor => Value::from(self.minor),
            VersionKey::Revision => Value::from(self.revision),
            VersionKey::Prerelease => self.prerelease.as_deref().map_or(Value::Null, Value::from),
            VersionKey::Build => Value::from(self.build),
        }
    }
}

/// Everything `info app` can report, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: Option<VersionInfo>,
    pub short_version: Option<VersionInfo>,
    pub identifier: Option<String>,
    pub path: String,
    pub filename: String,
    pub copyright: Option<String>,
}

impl AppInfo {
    /// Read the bundle at `path`.
    pub fn load(path: &Path) -> Result<Self, InfoError> {
        if !is_app_bundle(path) {
            return Err(InfoError::NotFound(path.to_path_buf()));
        }
        let bundle = AppBundle::open(path).map_err(InfoError::Unreadable)?;
        Ok(Self::from(&bundle))
    }

    /// The value for `key`, e.g. `identifier` or `version.major`. No key
    /// selects everything.
    pub fn select(&self, key: Option<&str>) -> Result<Value, InfoError> {
        let Some(key) = key else {
            return serde_json::to_value(self).map_err(|e| InfoError::Unreadable(e.into()));
        };

        let unknown = || InfoError::UnknownKey(key.to_string());
        let (head, sub) = match key.split_once('.') {
            Some((head, sub)) => (head, Some(sub)),
            None => (key, None),
        };
        let head = AppKey::from_str(head).map_err(|_| unknown())?;

        let version = match head {
            AppKey::Version => self.version.as_ref(),
            AppKey::ShortVersion => self.short_version.as_ref(),
            _ if sub.is_some() => return Err(unknown()),
            AppKey::Name => return Ok(Value::from(self.name.as_str())),
            AppKey::Identifier => return Ok(optional(&self.identifier)),
            AppKey::Path => return Ok(Value::from(self.path.as_str())),
            AppKey::Filename => return Ok(Value::from(self.filename.as_str())),
            AppKey::Copyright => return Ok(optional(&self.copyright)),
        };

        match (version, sub) {
            (None, _) => Ok(Value::Null),
            (Some(version), None) => {
                serde_json::to_value(version).map_err(|e| InfoError::Unreadable(e.into()))
            }
            (Some(version), Some(sub)) => {
                let sub = VersionKey::from_str(sub).map_err(|_| unknown())?;
                Ok(version.get(sub))
            }
        }
    }

    /// `key: value` lines, nested version fields as `version.major: 3`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("name: {}", self.name)];
        for (label, version) in [("version", &self.version), ("short_version", &self.short_version)] {
            match version {
                Some(version) => {
                    for sub in [
                        VersionKey::Raw,
                        VersionKey::Full,
                        VersionKey::Major,
                        VersionKey::Minor,
                        VersionKey::Revision,
                        VersionKey::Prerelease,
                        VersionKey::Build,
                    ] {
                        lines.push(format!("{}.{}: {}", label, sub, render(&version.get(sub))));
                    }
                }
                None => lines.push(format!("{}: ", label)),
            }
        }
        lines.push(format!("identifier: {}", self.identifier.as_deref().unwrap_or_default()));
        lines.push(format!("path: {}", self.path));
        lines.push(format!("filename: {}", self.filename));
        lines.push(format!("copyright: {}", self.copyright.as_deref().unwrap_or_default()));
        lines
    }
}

impl From<&AppBundle> for AppInfo {
    fn from(bundle: &AppBundle) -> Self {
        Self {
            name: bundle.name(),
            version: bundle.version().as_ref().map(VersionInfo::from),
            short_version: bundle.short_version().as_ref().map(VersionInfo::from),
            identifier: bundle.identifier(),
            path: bundle.path().display().to_string(),
            filename: bundle.filename(),
            copyright: bundle.copyright(),
        }
    }
}

fn optional(value: &Option<String>) -> Value {
    value.as_deref().map_or(Value::Null, Value::from)
}

/// Plain-text form of a scalar value.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
