//! Two-part schema version identifiers.
//!
//! Schema versions are written as `X.Y`, optionally prefixed with `v` and
//! optionally carrying a legacy patch component (`v2.0.0`). The patch is
//! accepted but ignored: only `(major, minor)` takes part in ordering.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// A parsed schema version.
///
/// Ordering is lexicographic on `(major, minor)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `[v]INT.INT[.INT]`.
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidFormat {
            version: version.to_string(),
            reason: reason.to_string(),
        };

        if version.is_empty() {
            return Err(invalid("version string cannot be empty"));
        }

        let cleaned = version.strip_prefix('v').unwrap_or(version);
        let parts: Vec<&str> = cleaned.split('.').collect();
        if parts.len() < 2 {
            return Err(invalid("expected format 'X.Y' or 'vX.Y.Z'"));
        }
        if parts.len() > 3 {
            return Err(invalid("at most three components are allowed"));
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("version components must be integers"));
            }
            let n = part
                .parse::<u32>()
                .map_err(|_| invalid("version component out of range"))?;
            numbers.push(n);
        }

        Ok(Self::new(numbers[0], numbers[1]))
    }

    /// Compare two version strings on `(major, minor)`.
    pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
        Ok(Self::parse(a)?.cmp(&Self::parse(b)?))
    }

    /// Canonical `"{major}.{minor}"` form of a version string.
    pub fn normalize(version: &str) -> Result<String, VersionError> {
        Ok(Self::parse(version)?.to_string())
    }

    /// True iff `version` parses and its major is in `supported_majors`.
    pub fn is_supported(version: &str, supported_majors: &BTreeSet<u32>) -> bool {
        Self::parse(version)
            .map(|v| supported_majors.contains(&v.major))
            .unwrap_or(false)
    }

    /// Tag form used in file names and legacy documents (`v3.0`).
    pub fn tag(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_all_spellings() {
        assert_eq!(Version::parse("3.0").unwrap(), Version::new(3, 0));
        assert_eq!(Version::parse("v2.1").unwrap(), Version::new(2, 1));
        assert_eq!(Version::parse("v1.0.0").unwrap(), Version::new(1, 0));
        assert_eq!(Version::parse("0.0").unwrap(), Version::new(0, 0));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "v", "3", "v3", "a.b", "3.x", "3.0.x", "3..0", "3.0.0.1", "-1.0", " 3.0"] {
            assert!(
                matches!(Version::parse(bad), Err(VersionError::InvalidFormat { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn compare_orders_on_major_then_minor() {
        assert_eq!(Version::compare("2.0", "3.0").unwrap(), Ordering::Less);
        assert_eq!(Version::compare("v3.1", "3.0").unwrap(), Ordering::Greater);
        assert_eq!(Version::compare("v3.0.0", "3.0").unwrap(), Ordering::Equal);
        assert_eq!(Version::compare("2.10", "2.9").unwrap(), Ordering::Greater);
        assert!(Version::compare("2.0", "nope").is_err());
    }

    #[test]
    fn normalize_drops_prefix_and_patch() {
        assert_eq!(Version::normalize("v2.0.0").unwrap(), "2.0");
        assert_eq!(Version::normalize("3.1").unwrap(), "3.1");
    }

    #[test]
    fn is_supported_checks_major() {
        let supported: BTreeSet<u32> = [2, 3].into_iter().collect();
        assert!(Version::is_supported("v2.0", &supported));
        assert!(Version::is_supported("3.5", &supported));
        assert!(!Version::is_supported("1.0", &supported));
        assert!(!Version::is_supported("garbage", &supported));
    }

    #[test]
    fn serde_uses_string_form() {
        let v: Version = serde_json::from_str("\"v3.0\"").unwrap();
        assert_eq!(v, Version::new(3, 0));
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.0\"");
        assert!(serde_json::from_str::<Version>("\"3\"").is_err());
    }

    #[test]
    fn tag_form() {
        assert_eq!(Version::new(3, 0).tag(), "v3.0");
    }
}
