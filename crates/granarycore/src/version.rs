//! Semantic version handling for mods.
//!
//! Mod authors do not reliably ship valid semantic versions. Instead of
//! failing discovery over a bad `Version` field, an unparseable version is
//! kept verbatim and tagged invalid; ordering against it is undefined, so an
//! invalid local version is never considered outdated.

use std::fmt;

use semver::Version;

/// A mod version: the raw string from the manifest plus its parsed form,
/// when the string is a valid semantic version.
#[derive(Debug, Clone)]
pub struct ModVersion {
    raw: String,
    parsed: Option<Version>,
}

impl ModVersion {
    /// Parse a version string leniently: surrounding whitespace and a
    /// leading `v` are tolerated, and a missing patch component is padded
    /// (`1.2` parses as `1.2.0`).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches(['v', 'V']);
        let parsed = Version::parse(trimmed)
            .ok()
            .or_else(|| Self::pad_and_parse(trimmed));
        ModVersion {
            raw: raw.trim().to_string(),
            parsed,
        }
    }

    fn pad_and_parse(trimmed: &str) -> Option<Version> {
        // Split off any pre-release/build suffix before counting components.
        let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
        let (numeric, suffix) = trimmed.split_at(split_at);
        let dots = numeric.matches('.').count();
        match dots {
            0 => Version::parse(&format!("{numeric}.0.0{suffix}")).ok(),
            1 => Version::parse(&format!("{numeric}.0{suffix}")).ok(),
            _ => None,
        }
    }

    /// Whether the raw string parsed as a valid semantic version.
    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    /// The version string as it appeared in the manifest.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether `other` is strictly newer than this version. False whenever
    /// either side is invalid, since ordering is undefined there.
    pub fn is_older_than(&self, other: &ModVersion) -> bool {
        match (&self.parsed, &other.parsed) {
            (Some(local), Some(remote)) => local < remote,
            _ => false,
        }
    }
}

impl fmt::Display for ModVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ModVersion {
    fn eq(&self, other: &Self) -> bool {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a == b,
            _ => self.raw == other.raw,
        }
    }
}

/// Whether a remote suggested version makes the local version outdated:
/// the suggestion must be strictly greater and the local version must be
/// syntactically valid.
pub fn is_outdated(local: &ModVersion, suggested: &str) -> bool {
    local.is_valid() && local.is_older_than(&ModVersion::parse(suggested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outdated_on_greater_suggestion() {
        let local = ModVersion::parse("1.0.0");
        assert!(is_outdated(&local, "1.2.0"));
    }

    #[test]
    fn test_not_outdated_on_equal_suggestion() {
        let local = ModVersion::parse("1.0.0");
        assert!(!is_outdated(&local, "1.0.0"));
    }

    #[test]
    fn test_not_outdated_on_older_suggestion() {
        let local = ModVersion::parse("2.1.0");
        assert!(!is_outdated(&local, "1.9.9"));
    }

    #[test]
    fn test_invalid_local_is_never_outdated() {
        let local = ModVersion::parse("not a version");
        assert!(!local.is_valid());
        assert!(!is_outdated(&local, "99.0.0"));
    }

    #[test]
    fn test_invalid_suggestion_is_ignored() {
        let local = ModVersion::parse("1.0.0");
        assert!(!is_outdated(&local, "latest"));
    }

    #[test]
    fn test_lenient_parse() {
        assert!(ModVersion::parse("v1.2.3").is_valid());
        assert!(ModVersion::parse(" 1.2 ").is_valid());
        assert!(ModVersion::parse("2").is_valid());
        assert_eq!(ModVersion::parse("1.2"), ModVersion::parse("1.2.0"));
    }

    #[test]
    fn test_prerelease_precedence() {
        let local = ModVersion::parse("1.0.0-beta.2");
        assert!(is_outdated(&local, "1.0.0"));
        assert!(!is_outdated(&ModVersion::parse("1.0.0"), "1.0.0-beta.2"));
    }

    #[test]
    fn test_raw_preserved() {
        let version = ModVersion::parse("totally broken");
        assert_eq!(version.raw(), "totally broken");
        assert_eq!(version.to_string(), "totally broken");
    }
}
