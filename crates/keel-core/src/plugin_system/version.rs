use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },
    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidRange { constraint: String, message: String },
}

/// Parses a plugin version such as `1.2.3` or `0.4.0-beta.1`.
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        version: version.to_string(),
        message: e.to_string(),
    })
}

/// Characters that make up a comparison operator
const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// A version range written the way manifests write them.
///
/// Manifests use the npm range dialect:
///
/// - a bare version such as `1.0.0` is an exact pin;
/// - `1.2` and `1.x` are partial versions covering their whole minor or major;
/// - comparators separated by spaces must all hold (`>=1.0.0 <2.0.0`);
/// - `a - b` is an inclusive hyphen range;
/// - `||` separates alternatives.
///
/// Comma-separated comparators (`>=2, <3`) are accepted as well. Each
/// alternative is translated to a `semver::VersionReq`. The original
/// constraint text is kept so error messages and summaries show exactly
/// what the manifest declared.
#[derive(Debug, Clone)]
pub struct VersionRange {
    /// The original constraint string (e.g., "^1.2.3", ">=2.0 <3")
    constraint: String,
    /// A version is in range when any alternative matches
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Creates a new version range from a constraint string.
    ///
    /// `latest` and the empty string are accepted as "any version".
    pub fn from_constraint(constraint: &str) -> Result<Self, VersionError> {
        let alternatives = constraint
            .split("||")
            .map(|set| {
                VersionReq::parse(&comparator_set(set)).map_err(|e| VersionError::InvalidRange {
                    constraint: constraint.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            constraint: constraint.to_string(),
            alternatives,
        })
    }

    /// Checks if a specific `semver::Version` satisfies this range.
    pub fn includes(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Parses `version` and checks it against the range. Unparseable
    /// versions never match.
    pub fn includes_str(&self, version: &str) -> bool {
        parse_version(version).map(|v| self.includes(&v)).unwrap_or(false)
    }

    /// Returns the original constraint string.
    pub fn constraint_string(&self) -> &str {
        &self.constraint
    }
}

/// Translate one `||` alternative into `VersionReq` syntax
fn comparator_set(set: &str) -> String {
    let set = set.trim();
    if set.is_empty() || set == "latest" {
        return "*".to_string();
    }
    if let Some((low, high)) = set.split_once(" - ") {
        return format!(
            "{}, {}",
            comparator(&format!(">={}", low.trim())),
            comparator(&format!("<={}", high.trim()))
        );
    }

    let mut comparators = Vec::new();
    let mut operator = String::new();
    for token in set.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        // `>= 1.2.0` splits the operator from its version
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            operator.push_str(token);
            continue;
        }
        comparators.push(comparator(&format!("{}{}", std::mem::take(&mut operator), token)));
    }
    if !operator.is_empty() {
        comparators.push(operator);
    }
    if comparators.is_empty() {
        return "*".to_string();
    }
    comparators.join(", ")
}

/// Translate a single comparator. Wildcard components (`x`, `X`, `*`)
/// truncate the version, and a bare version without an operator pins it.
/// Anything unrecognised is passed through for `VersionReq` to reject.
fn comparator(token: &str) -> String {
    let split = token.find(|c: char| !OPERATOR_CHARS.contains(&c)).unwrap_or(token.len());
    let (operator, version) = token.split_at(split);
    let version = version.strip_prefix('v').unwrap_or(version);

    let core = version.split(['-', '+']).next().unwrap_or(version);
    let parts: Vec<&str> = core.split('.').collect();
    let is_wildcard = |part: &&str| matches!(*part, "x" | "X" | "*");
    let numeric = |part: &&str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());

    if let Some(first_wildcard) = parts.iter().position(is_wildcard) {
        let kept = &parts[..first_wildcard];
        if kept.is_empty() || !kept.iter().all(numeric) {
            return if kept.is_empty() { "*".to_string() } else { token.to_string() };
        }
        let operator = if operator.is_empty() { "=" } else { operator };
        return format!("{}{}", operator, kept.join("."));
    }

    if operator.is_empty() && parts.len() <= 3 && parts.iter().all(numeric) {
        return format!("={}", version);
    }
    if operator.is_empty() {
        return token.to_string();
    }
    format!("{}{}", operator, version)
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.alternatives == other.alternatives
    }
}

impl Eq for VersionRange {}

/// Implement Display to show the original constraint string.
impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::from_constraint(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.constraint)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let constraint = String::deserialize(deserializer)?;
        VersionRange::from_constraint(&constraint).map_err(serde::de::Error::custom)
    }
}
