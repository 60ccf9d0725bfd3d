//! Property tests: version strings parse and normalize to `X.Y`.

use mediaplan_types::{Version, VersionError};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Valid spellings of a version together with the expected `(major, minor)`.
fn arb_valid_version() -> impl Strategy<Value = (String, u32, u32)> {
    (0u32..1000, 0u32..1000, 0u32..100, 0usize..3).prop_map(|(major, minor, patch, form)| {
        let text = match form {
            0 => format!("{major}.{minor}"),
            1 => format!("v{major}.{minor}"),
            _ => format!("v{major}.{minor}.{patch}"),
        };
        (text, major, minor)
    })
}

/// Strings that are never valid versions.
fn arb_malformed_version() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9]{1,4}".prop_map(|s| s),
        "v[0-9]{1,4}".prop_map(|s| s),
        "[a-z]{1,5}\\.[0-9]{1,3}".prop_map(|s| s),
        "[0-9]{1,3}\\.[a-z]{1,5}".prop_map(|s| s),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn parse_then_normalize_yields_major_minor((text, major, minor) in arb_valid_version()) {
        let parsed = Version::parse(&text).unwrap();
        prop_assert_eq!(parsed, Version::new(major, minor));
        prop_assert_eq!(Version::normalize(&text).unwrap(), format!("{major}.{minor}"));
    }

    #[test]
    fn malformed_versions_are_rejected(text in arb_malformed_version()) {
        let is_invalid = matches!(Version::parse(&text), Err(VersionError::InvalidFormat { .. }));
        prop_assert!(is_invalid);
    }

    #[test]
    fn ordering_follows_major_then_minor(
        a in (0u32..50, 0u32..50),
        b in (0u32..50, 0u32..50),
    ) {
        let left = format!("v{}.{}", a.0, a.1);
        let right = format!("{}.{}", b.0, b.1);
        prop_assert_eq!(Version::compare(&left, &right).unwrap(), a.cmp(&b));
    }
}
