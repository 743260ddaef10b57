//! Version parsing and constraint matching for discovery queries.
//!
//! Supported constraint forms:
//! - `*`: any version
//! - `1.2.3`: exact
//! - `1.x`, `1.2.x` (or `*` in place of `x`): wildcard
//! - `^1.2.3`: compatible, same left-most non-zero component
//! - `~1.2.3`: same major and minor

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version '{0}'")]
pub struct VersionParseError(pub String);

/// A `major.minor.patch` version. Missing components default to zero and a
/// leading `v` plus any pre-release/build suffix are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let trimmed = s.trim().trim_start_matches('v');
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        if core.is_empty() {
            return Err(err());
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for piece in core.split('.') {
            if count == 3 {
                return Err(err());
            }
            parts[count] = piece.parse().map_err(|_| err())?;
            count += 1;
        }
        Ok(Version::new(parts[0], parts[1], parts[2]))
    }
}

/// A version requirement used to filter registry instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    Any,
    Exact(Version),
    Wildcard { major: u64, minor: Option<u64> },
    Caret(Version),
    Tilde(Version),
}

impl VersionConstraint {
    /// Returns true if `version` satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => v == version,
            VersionConstraint::Wildcard { major, minor } => {
                version.major == *major && minor.map_or(true, |m| version.minor == m)
            }
            VersionConstraint::Caret(v) => {
                if version < v {
                    return false;
                }
                if v.major > 0 {
                    version.major == v.major
                } else if v.minor > 0 {
                    version.major == 0 && version.minor == v.minor
                } else {
                    version == v
                }
            }
            VersionConstraint::Tilde(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
        }
    }

    /// Match against a raw version string as published in the registry.
    /// Unparseable versions only satisfy `Any`.
    pub fn matches_str(&self, raw: &str) -> bool {
        match raw.parse::<Version>() {
            Ok(v) => self.matches(&v),
            Err(_) => matches!(self, VersionConstraint::Any),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => f.write_str("*"),
            VersionConstraint::Exact(v) => write!(f, "{}", v),
            VersionConstraint::Wildcard { major, minor: None } => write!(f, "{}.x", major),
            VersionConstraint::Wildcard {
                major,
                minor: Some(minor),
            } => write!(f, "{}.{}.x", major, minor),
            VersionConstraint::Caret(v) => write!(f, "^{}", v),
            VersionConstraint::Tilde(v) => write!(f, "~{}", v),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }
        if let Some(rest) = s.strip_prefix('^') {
            return rest.parse().map(VersionConstraint::Caret);
        }
        if let Some(rest) = s.strip_prefix('~') {
            return rest.parse().map(VersionConstraint::Tilde);
        }

        let pieces: Vec<&str> = s.split('.').collect();
        let is_wild = |p: &str| p == "x" || p == "X" || p == "*";
        if let Some(pos) = pieces.iter().position(|p| is_wild(*p)) {
            if !pieces[pos..].iter().all(|p| is_wild(*p)) {
                return Err(VersionParseError(s.to_string()));
            }
            let num = |i: usize| -> Result<u64, VersionParseError> {
                pieces[i].parse().map_err(|_| VersionParseError(s.to_string()))
            };
            return match pos {
                0 => Ok(VersionConstraint::Any),
                1 => Ok(VersionConstraint::Wildcard {
                    major: num(0)?,
                    minor: None,
                }),
                2 => Ok(VersionConstraint::Wildcard {
                    major: num(0)?,
                    minor: Some(num(1)?),
                }),
                _ => Err(VersionParseError(s.to_string())),
            };
        }

        s.parse().map(VersionConstraint::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("v2.0"), Version::new(2, 0, 0));
        assert_eq!(v("1.0.0-SNAPSHOT"), Version::new(1, 0, 0));
        assert!("".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("one".parse::<Version>().is_err());
    }

    #[test]
    fn test_exact_and_any() {
        assert!(c("1.0.0").matches(&v("1.0.0")));
        assert!(!c("1.0.0").matches(&v("1.0.1")));
        assert!(c("*").matches(&v("9.9.9")));
        assert!(c("").matches(&v("0.0.1")));
    }

    #[test]
    fn test_wildcards() {
        assert!(c("1.x").matches(&v("1.7.3")));
        assert!(!c("1.x").matches(&v("2.0.0")));
        assert!(c("1.2.*").matches(&v("1.2.9")));
        assert!(!c("1.2.x").matches(&v("1.3.0")));
        assert!("1.x.3".parse::<VersionConstraint>().is_err());
    }

    #[test]
    fn test_caret_and_tilde() {
        assert!(c("^1.2.0").matches(&v("1.9.0")));
        assert!(!c("^1.2.0").matches(&v("1.1.9")));
        assert!(!c("^1.2.0").matches(&v("2.0.0")));
        assert!(c("^0.2.1").matches(&v("0.2.5")));
        assert!(!c("^0.2.1").matches(&v("0.3.0")));
        assert!(c("^0.0.3").matches(&v("0.0.3")));
        assert!(!c("^0.0.3").matches(&v("0.0.4")));
        assert!(c("~1.2.0").matches(&v("1.2.7")));
        assert!(!c("~1.2.0").matches(&v("1.3.0")));
    }

    #[test]
    fn test_unparseable_instance_version() {
        assert!(c("*").matches_str("latest"));
        assert!(!c("1.0.0").matches_str("latest"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for raw in ["*", "1.0.0", "1.x", "1.2.x", "^1.2.0", "~0.3.1"] {
            assert_eq!(c(raw).to_string().parse::<VersionConstraint>().unwrap(), c(raw));
        }
    }
}
