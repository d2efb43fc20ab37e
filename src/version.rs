//! Dotted version strings with an optional pre-release marker.
//!
//! Application bundles carry free-form version strings (`3.1`, `2.0.0-beta`,
//! `v1.4.2.1077`). `SemanticVersion` extracts up to four numeric components
//! and treats whatever trails them as a pre-release marker.
//!
//! # Ordering
//!
//! Versions order by `(major, minor, revision, build)`. Missing components
//! are zero, so `1.2` equals `1.2.0`. A version with a pre-release marker
//! sorts below the release with the same numbers; two pre-releases with the
//! same numbers compare their markers lexically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The version string has no leading numeric component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed version: '{0}'")]
pub struct MalformedVersion(pub String);

/// A parsed version. Equality ignores the raw text, so `eq`/`gt` come from
/// the `PartialEq`/`PartialOrd` impls built on [`SemanticVersion::compare`].
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    raw: String,
    major: u64,
    minor: u64,
    revision: u64,
    build: u64,
    pre_release: Option<String>,
}

impl SemanticVersion {
    /// Parse a version string.
    ///
    /// Leading whitespace and a `v`/`V` prefix are ignored, and so are
    /// numeric components past the fourth.
    pub fn parse(raw: &str) -> Result<Self, MalformedVersion> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let mut numbers = [0u64; 4];
        let mut rest = body;
        let mut count = 0;

        while count < numbers.len() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                break;
            }
            numbers[count] = rest[..digits]
                .parse()
                .map_err(|_| MalformedVersion(raw.to_string()))?;
            count += 1;
            rest = &rest[digits..];

            // Only consume the dot when another number follows it
            match rest.strip_prefix('.') {
                Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
                _ => break,
            }
        }

        if count == 0 {
            return Err(MalformedVersion(raw.to_string()));
        }

        if count == numbers.len() {
            loop {
                let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                rest = &rest[digits..];
                match rest.strip_prefix('.') {
                    Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
                    _ => break,
                }
            }
        }

        let marker = rest.trim_start_matches(['-', '.', '_', '+', ' ']).trim();
        let pre_release = (!marker.is_empty()).then(|| marker.to_string());

        Ok(Self {
            raw: raw.to_string(),
            major: numbers[0],
            minor: numbers[1],
            revision: numbers[2],
            build: numbers[3],
            pre_release,
        })
    }

    /// The text this version was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn build(&self) -> u64 {
        self.build
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }

    /// Returns true if this version carries a pre-release marker.
    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// Three-way comparison, see the module docs for the rules.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.numeric()
            .cmp(&other.numeric())
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }

    fn numeric(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.revision, self.build)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl FromStr for SemanticVersion {
    type Err = MalformedVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Normalized form: `major.minor.revision`, `.build` when non-zero, then
/// `-marker` for pre-releases.
impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)?;
        if self.build != 0 {
            write!(f, ".{}", self.build)?;
        }
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    #[test]
    fn test_missing_components_are_zero() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert_eq!(v("1.2").revision(), 0);
    }

    #[test]
    fn test_pre_release_sorts_below_release() {
        assert_eq!(v("2.0.0-beta").compare(&v("2.0.0")), Ordering::Less);
        assert!(v("2.0.0").gt(&v("2.0.0-rc1")));
        assert!(v("2.0.0-beta") > v("1.9.9"));
    }

    #[test]
    fn test_four_components() {
        let version = v("16.78.2.1077");
        assert_eq!(version.major(), 16);
        assert_eq!(version.minor(), 78);
        assert_eq!(version.revision(), 2);
        assert_eq!(version.build(), 1077);
        assert!(version.gt(&v("16.78.2.1076")));
    }

    #[test]
    fn test_components_past_fourth_are_ignored() {
        let version = v("1.2.3.4.5");
        assert_eq!(version.build(), 4);
        assert_eq!(version.pre_release(), None);
        assert_eq!(version, v("1.2.3.4"));
        assert!(v("1.2.3.5.0") > v("1.2.3.4.9"));

        let version = v("1.2.3.4.5.6-rc1");
        assert_eq!(version.pre_release(), Some("rc1"));
        assert_eq!(version.compare(&v("1.2.3.4")), Ordering::Less);
    }

    #[test]
    fn test_prefix_and_markers() {
        let version = v("v3.1.0-beta.2");
        assert_eq!(version.major(), 3);
        assert_eq!(version.pre_release(), Some("beta.2"));

        assert_eq!(v("1.4b3").pre_release(), Some("b3"));
        assert_eq!(v("1.0 (1234)").pre_release(), Some("(1234)"));
    }

    #[test]
    fn test_trailing_dot_is_not_a_component() {
        let version = v("4.");
        assert_eq!(version.major(), 4);
        assert_eq!(version.pre_release(), None);
    }

    #[test]
    fn test_malformed() {
        assert!(SemanticVersion::parse("").is_err());
        assert!(SemanticVersion::parse("beta").is_err());
        assert_eq!(
            SemanticVersion::parse("x1.0").unwrap_err().to_string(),
            "Malformed version: 'x1.0'"
        );
    }

    #[test]
    fn test_raw_is_preserved() {
        let version = v(" 1.2 ");
        assert_eq!(version.raw(), " 1.2 ");
        assert_eq!(version.to_string(), "1.2.0");
        assert_eq!(v(version.raw()), version);
    }

    #[test]
    fn test_display_includes_build_and_marker() {
        assert_eq!(v("1.2.3.4-rc1").to_string(), "1.2.3.4-rc1");
    }
}
