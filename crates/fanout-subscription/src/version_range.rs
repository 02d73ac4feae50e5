//! Semver range grammar (spec §4.2 "Version ranges").
//!
//! Supported: exact `X.Y.Z`; caret `^X.Y.Z` (same major, version >= target);
//! tilde `~X.Y.Z` (same major & minor, patch >= target); and the plain
//! comparison operators `>=`, `>`, `<=`, `<`. Anything else is
//! `RangeUnsupported`. A missing event version or missing subscription
//! range is compatible by default (spec §4.2).

use semver::Version;

use crate::error::SubscriptionError;

/// `checkSchemaCompatibility(eventVer, range) -> (ok, reason)`.
pub fn check_compatibility(event_version: Option<&str>, range: Option<&str>) -> Result<(bool, String), SubscriptionError> {
    let (Some(event_version), Some(range)) = (event_version, range) else {
        return Ok((true, "no version constraint declared".to_string()));
    };

    let event_version = parse_version(event_version)?;

    if let Some(target) = range.strip_prefix('^') {
        let target = parse_version(target)?;
        let ok = event_version.major == target.major && event_version >= target;
        return Ok((ok, format!("caret range ^{target} against {event_version}")));
    }
    if let Some(target) = range.strip_prefix('~') {
        let target = parse_version(target)?;
        let ok = event_version.major == target.major && event_version.minor == target.minor && event_version >= target;
        return Ok((ok, format!("tilde range ~{target} against {event_version}")));
    }
    for (op, strip) in [(">=", 2), (">", 1), ("<=", 2), ("<", 1)] {
        if let Some(target) = range.strip_prefix(op) {
            let target = parse_version(target.trim())?;
            let ok = match op {
                ">=" => event_version >= target,
                ">" => event_version > target,
                "<=" => event_version <= target,
                "<" => event_version < target,
                _ => unreachable!(),
            };
            let _ = strip;
            return Ok((ok, format!("{op} {target} against {event_version}")));
        }
    }
    if let Ok(target) = Version::parse(range.trim()) {
        return Ok((event_version == target, format!("exact {target} against {event_version}")));
    }

    Err(SubscriptionError::RangeUnsupported(range.to_string()))
}

fn parse_version(raw: &str) -> Result<Version, SubscriptionError> {
    Version::parse(raw.trim()).map_err(|_| SubscriptionError::VersionInvalid(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_version_or_range_is_compatible() {
        assert!(check_compatibility(None, Some("^1.0.0")).unwrap().0);
        assert!(check_compatibility(Some("1.0.0"), None).unwrap().0);
    }

    #[test]
    fn caret_allows_same_major_greater_equal() {
        assert!(check_compatibility(Some("1.4.0"), Some("^1.2.0")).unwrap().0);
        assert!(!check_compatibility(Some("2.0.0"), Some("^1.2.0")).unwrap().0);
        assert!(!check_compatibility(Some("1.1.0"), Some("^1.2.0")).unwrap().0);
    }

    #[test]
    fn tilde_allows_same_minor_greater_equal_patch() {
        assert!(check_compatibility(Some("1.2.5"), Some("~1.2.0")).unwrap().0);
        assert!(!check_compatibility(Some("1.3.0"), Some("~1.2.0")).unwrap().0);
    }

    #[test]
    fn comparison_operators() {
        assert!(check_compatibility(Some("1.5.0"), Some(">=1.2.0")).unwrap().0);
        assert!(!check_compatibility(Some("1.0.0"), Some(">1.0.0")).unwrap().0);
        assert!(check_compatibility(Some("1.0.0"), Some("<=1.0.0")).unwrap().0);
        assert!(check_compatibility(Some("0.9.0"), Some("<1.0.0")).unwrap().0);
    }

    #[test]
    fn exact_match() {
        assert!(check_compatibility(Some("1.2.3"), Some("1.2.3")).unwrap().0);
        assert!(!check_compatibility(Some("1.2.4"), Some("1.2.3")).unwrap().0);
    }

    #[test]
    fn unsupported_operator_errors() {
        assert!(matches!(
            check_compatibility(Some("1.0.0"), Some("!=1.0.0")),
            Err(SubscriptionError::RangeUnsupported(_))
        ));
    }

    #[test]
    fn malformed_semver_errors() {
        assert!(matches!(
            check_compatibility(Some("not-a-version"), Some("^1.0.0")),
            Err(SubscriptionError::VersionInvalid(_))
        ));
    }
}
