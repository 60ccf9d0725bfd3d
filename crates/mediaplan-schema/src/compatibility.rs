//! How a plan's schema version relates to the version this build writes.

use std::collections::BTreeSet;

use mediaplan_types::Version;
use serde::Serialize;

/// Relationship of a plan version to the current version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Same `(major, minor)` as current.
    Native,
    /// Current major, newer minor.
    ForwardMinor,
    /// Current major, older minor.
    BackwardCompatible,
    /// Older supported major; readable after migration.
    Deprecated,
    /// Unparsable, unsupported major, or newer major.
    Unsupported,
}

impl std::fmt::Display for Compatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::ForwardMinor => write!(f, "forward_minor"),
            Self::BackwardCompatible => write!(f, "backward_compatible"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// What a caller should do with a plan of a given version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    None,
    Downgrade,
    Upgrade,
    Migrate,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub compatibility: Compatibility,
    pub action: RecommendedAction,
    pub message: String,
    pub can_import: bool,
    pub should_upgrade: bool,
}

/// Classify `version` against `current` and the supported majors.
pub fn classify(
    version: &str,
    current: Version,
    supported_majors: &BTreeSet<u32>,
) -> Compatibility {
    let Ok(parsed) = Version::parse(version) else {
        return Compatibility::Unsupported;
    };
    if parsed.major == 0 || !supported_majors.contains(&parsed.major) {
        return Compatibility::Unsupported;
    }
    match parsed.major.cmp(&current.major) {
        std::cmp::Ordering::Greater => Compatibility::Unsupported,
        std::cmp::Ordering::Less => Compatibility::Deprecated,
        std::cmp::Ordering::Equal => match parsed.minor.cmp(&current.minor) {
            std::cmp::Ordering::Equal => Compatibility::Native,
            std::cmp::Ordering::Greater => Compatibility::ForwardMinor,
            std::cmp::Ordering::Less => Compatibility::BackwardCompatible,
        },
    }
}

/// Message for plans whose major predates the supported range.
///
/// Each legacy major must first be brought forward by the toolkit generation
/// that still understands it.
pub fn legacy_rejection(version: &str, major: u32) -> String {
    format!(
        "schema version {version} (v{major}.x) is no longer supported; \
         use SDK v{next}.x to migrate v{major}.x plans to v{next}.0 first",
        next = major + 1
    )
}

/// Recommended handling of a plan at `version`.
pub fn recommendation(
    version: &str,
    current: Version,
    supported_majors: &BTreeSet<u32>,
) -> Recommendation {
    let compatibility = classify(version, current, supported_majors);
    let (action, message, can_import, should_upgrade) = match compatibility {
        Compatibility::Native => (
            RecommendedAction::None,
            format!("schema version {version} is natively supported"),
            true,
            false,
        ),
        Compatibility::ForwardMinor => (
            RecommendedAction::Downgrade,
            format!(
                "schema version {version} will be read as {current}; newer fields are preserved but inactive"
            ),
            true,
            false,
        ),
        Compatibility::BackwardCompatible => (
            RecommendedAction::Upgrade,
            format!("schema version {version} will be upgraded to {current} during import"),
            true,
            true,
        ),
        Compatibility::Deprecated => (
            RecommendedAction::Migrate,
            format!("schema version {version} is deprecated; migrate to {current}"),
            true,
            true,
        ),
        Compatibility::Unsupported => {
            let min_supported = supported_majors.iter().next().copied().unwrap_or(current.major);
            let message = match Version::parse(version) {
                Ok(v) if v.major < min_supported => legacy_rejection(version, v.major),
                Ok(_) => format!("schema version {version} is not supported by schema {current}"),
                Err(e) => e.to_string(),
            };
            (RecommendedAction::Reject, message, false, true)
        }
    };

    Recommendation {
        compatibility,
        action,
        message,
        can_import,
        should_upgrade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn majors() -> BTreeSet<u32> {
        [2, 3].into_iter().collect()
    }

    const CURRENT: Version = Version::new(3, 0);

    #[test]
    fn classification() {
        let m = majors();
        assert_eq!(classify("v3.0", CURRENT, &m), Compatibility::Native);
        assert_eq!(classify("3.0.0", CURRENT, &m), Compatibility::Native);
        assert_eq!(classify("3.2", CURRENT, &m), Compatibility::ForwardMinor);
        assert_eq!(classify("v2.0", CURRENT, &m), Compatibility::Deprecated);
        assert_eq!(classify("v1.0", CURRENT, &m), Compatibility::Unsupported);
        assert_eq!(classify("v0.0", CURRENT, &m), Compatibility::Unsupported);
        assert_eq!(classify("4.0", CURRENT, &m), Compatibility::Unsupported);
        assert_eq!(classify("nope", CURRENT, &m), Compatibility::Unsupported);

        let current = Version::new(3, 1);
        assert_eq!(classify("3.0", current, &m), Compatibility::BackwardCompatible);
    }

    #[test]
    fn legacy_majors_point_to_older_sdk() {
        let m = majors();
        let v1 = recommendation("v1.0", CURRENT, &m);
        assert_eq!(v1.action, RecommendedAction::Reject);
        assert!(!v1.can_import);
        assert!(v1.message.contains("SDK v2.x"));

        let v0 = recommendation("v0.0.7", CURRENT, &m);
        assert!(v0.message.contains("SDK v1.x"));

        let future = recommendation("4.0", CURRENT, &m);
        assert!(!future.message.contains("SDK"));
    }

    #[test]
    fn importable_versions() {
        let m = majors();
        let native = recommendation("3.0", CURRENT, &m);
        assert_eq!(native.action, RecommendedAction::None);
        assert!(native.can_import && !native.should_upgrade);

        let old = recommendation("2.0", CURRENT, &m);
        assert_eq!(old.action, RecommendedAction::Migrate);
        assert!(old.can_import && old.should_upgrade);
    }
}
