//! Forgiving semver parsing and comparison
//!
//! Registries and git tags disagree about the leading `v`; parsing here
//! accepts it and defers everything else to SemVer 2.0 rules. Build
//! metadata never affects ordering.

use rebuildr_errors::VersionError;
use semver::Version;
use std::cmp::Ordering;

/// Parse a version string, tolerating a leading `v`.
///
/// # Errors
///
/// Returns `InvalidSemver` if the remainder is not a SemVer 2.0 version.
pub fn parse(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.strip_prefix('v').unwrap_or(input);
    Version::parse(trimmed).map_err(|_| VersionError::InvalidSemver {
        input: input.to_string(),
    })
}

/// Compare two version strings under SemVer 2.0 precedence.
///
/// A missing prerelease outranks any present one and build metadata is
/// ignored, both per the standard.
///
/// # Errors
///
/// Returns `InvalidSemver` if either input fails to parse.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = parse(a)?;
    let vb = parse(b)?;
    Ok(va.cmp_precedence(&vb))
}

/// Whether `input` parses as a plain release version: no prerelease, no
/// build metadata.
#[must_use]
pub fn is_plain_release(input: &str) -> bool {
    parse(input).is_ok_and(|v| v.pre.is_empty() && v.build.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn leading_v_is_forgiven() {
        assert_eq!(parse("v1.2.3").unwrap(), parse("1.2.3").unwrap());
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in ["", "1", "1.2", "abc", "1.2.3.4"] {
            assert!(parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn prerelease_orders_below_release() {
        assert_eq!(compare("1.0.0-alpha", "1.0.0").unwrap(), Ordering::Less);
        assert_eq!(
            compare("1.0.0-alpha", "1.0.0-alpha.1").unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare("1.0.0-alpha.1", "1.0.0-beta").unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn build_metadata_ignored() {
        assert_eq!(
            compare("1.0.0+build1", "1.0.0+build2").unwrap(),
            Ordering::Equal
        );
    }

    fn semver_strategy() -> impl Strategy<Value = String> {
        let pre = prop_oneof![
            Just(String::new()),
            "(alpha|beta|rc)\\.(0|[1-9][0-9]?)".prop_map(|s| format!("-{s}")),
        ];
        let build = prop_oneof![
            Just(String::new()),
            "[0-9a-f]{1,6}".prop_map(|s| format!("+{s}")),
        ];
        (0u64..50, 0u64..50, 0u64..50, pre, build)
            .prop_map(|(ma, mi, pa, pre, build)| format!("{ma}.{mi}.{pa}{pre}{build}"))
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in semver_strategy(), b in semver_strategy()) {
            let ab = compare(&a, &b).unwrap();
            let ba = compare(&b, &a).unwrap();
            prop_assert_eq!(ab, ba.reverse());
        }

        #[test]
        fn compare_is_reflexive(a in semver_strategy()) {
            prop_assert_eq!(compare(&a, &a).unwrap(), Ordering::Equal);
        }
    }
}
