//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Full Git object identifier (SHA)
//! - [`ShaPrefix`] - Abbreviated SHA as typed by a user (7-40 hex characters)
//! - [`CookbookName`] - Cookbook directory name of the form `{prefix}_{basename}`
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented.
//!
//! # Examples
//!
//! ```
//! use linecook::core::types::{BranchName, CookbookName, Oid, ShaPrefix};
//!
//! let branch = BranchName::new("line-cook/fb_/update").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let prefix = ShaPrefix::new("abc123d").unwrap();
//! assert!(prefix.matches(&oid));
//!
//! let cookbook = CookbookName::new("fb_apache").unwrap();
//! assert!(cookbook.has_prefix("fb"));
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(ShaPrefix::new("abc").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid commit sha: {0}")]
    InvalidShaPrefix(String),

    #[error("invalid cookbook name: {0}")]
    InvalidCookbookName(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, ASCII control characters, or any of `` ~^:\?*[``
///
/// The bot's own sync branch `line-cook/fb_/update` is valid: a path component
/// may end in `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(problem) = Self::problem(&name) {
            return Err(TypeError::InvalidBranchName(format!("'{name}': {problem}")));
        }
        Ok(Self(name))
    }

    fn problem(name: &str) -> Option<String> {
        if name.is_empty() {
            return Some("cannot be empty".into());
        }
        if name == "@" {
            return Some("'@' is reserved".into());
        }
        if name.starts_with('-') {
            return Some("cannot start with '-'".into());
        }
        if name.ends_with('/') {
            return Some("cannot end with '/'".into());
        }
        for forbidden in ["..", "@{", "//"] {
            if name.contains(forbidden) {
                return Some(format!("cannot contain '{forbidden}'"));
            }
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_ascii_control() || " ~^:\\?*[".contains(*c))
        {
            return Some(format!("cannot contain {c:?}"));
        }
        if name
            .split('/')
            .any(|component| component.starts_with('.') || component.ends_with(".lock"))
        {
            return Some("path components cannot start with '.' or end with '.lock'".into());
        }
        None
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// ```
/// use linecook::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(8), "abc123de");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the input is 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().trim().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !is_hex(&oid) {
            return Err(TypeError::InvalidOid(format!("'{oid}' is not hexadecimal")));
        }
        Ok(Self(oid))
    }

    /// The first `len` characters, or the whole id if shorter.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An abbreviated commit SHA, 7 to 40 hex characters.
///
/// Commands accept these from comment text; they are matched against the
/// full SHAs recorded in trailers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaPrefix(String);

impl ShaPrefix {
    /// Minimum accepted length.
    pub const MIN_LEN: usize = 7;
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 40;

    /// Create a new validated SHA prefix (normalized to lowercase).
    pub fn new(sha: impl Into<String>) -> Result<Self, TypeError> {
        let sha = sha.into().to_ascii_lowercase();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&sha.len()) || !is_hex(&sha) {
            return Err(TypeError::InvalidShaPrefix(format!(
                "'{sha}' must be {}-{} hex characters",
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        Ok(Self(sha))
    }

    /// Whether this prefix abbreviates `full` (which may itself be abbreviated).
    pub fn matches(&self, full: impl AsRef<str>) -> bool {
        let full = full.as_ref().to_ascii_lowercase();
        full.starts_with(&self.0) || self.0.starts_with(&full)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShaPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cookbook directory name, `{prefix}_{basename}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CookbookName(String);

impl CookbookName {
    /// Create a new validated cookbook name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCookbookName` if the name is not a single
    /// path component containing an `_` separator with text on both sides.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let well_formed = !name.contains('/')
            && !name.starts_with('.')
            && name
                .split_once('_')
                .is_some_and(|(prefix, rest)| !prefix.is_empty() && !rest.is_empty());
        if !well_formed {
            return Err(TypeError::InvalidCookbookName(format!(
                "'{name}' is not of the form <prefix>_<name>"
            )));
        }
        Ok(Self(name))
    }

    /// Whether this cookbook is namespaced under `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('_'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CookbookName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CookbookName> for String {
    fn from(name: CookbookName) -> Self {
        name.0
    }
}

impl AsRef<str> for CookbookName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CookbookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn bot_branches_are_valid() {
            assert!(BranchName::new("line-cook/fb_/update").is_ok());
            assert!(BranchName::new("line-cook/pd_onboard").is_ok());
            assert!(BranchName::new("line-cook/fb_fix_missing_baselines").is_ok());
            assert!(BranchName::new("line-cook/fb_/update-split-1").is_ok());
        }

        #[test]
        fn refname_violations_rejected() {
            for bad in [
                "",
                "@",
                "-flag",
                "branch/",
                "bad..path",
                "foo@{bar",
                "foo//bar",
                "has space",
                "has:colon",
                "has\ttab",
                ".hidden",
                "foo/.hidden",
                "branch.lock",
            ] {
                assert!(BranchName::new(bad).is_err(), "{bad:?} should be rejected");
            }
        }

        #[test]
        fn error_names_the_branch() {
            let err = BranchName::new("bad..path").unwrap_err();
            assert!(err.to_string().contains("bad..path"));
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case_and_whitespace() {
            let oid = Oid::new(" ABCDEF0123456789ABCDEF0123456789ABCDEF01\n").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn wrong_length_rejected() {
            assert!(Oid::new("abc123").is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn short_clamps() {
            let oid = Oid::new("a".repeat(40)).unwrap();
            assert_eq!(oid.short(8), "aaaaaaaa");
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod sha_prefix {
        use super::*;

        #[test]
        fn length_bounds() {
            assert!(ShaPrefix::new("abc123").is_err());
            assert!(ShaPrefix::new("abc1234").is_ok());
            assert!(ShaPrefix::new("a".repeat(40)).is_ok());
            assert!(ShaPrefix::new("a".repeat(41)).is_err());
        }

        #[test]
        fn rejects_non_hex() {
            assert!(ShaPrefix::new("invalid").is_err());
            assert!(ShaPrefix::new("xyz1234").is_err());
        }

        #[test]
        fn matches_full_and_abbreviated() {
            let prefix = ShaPrefix::new("ABC1234").unwrap();
            assert!(prefix.matches("abc1234def5678abc1234def5678abc1234def56"));
            assert!(prefix.matches("abc1234"));
            assert!(!prefix.matches("abc1235def5678abc1234def5678abc1234def56"));
        }
    }

    mod cookbook_name {
        use super::*;

        #[test]
        fn valid_names() {
            assert!(CookbookName::new("fb_apache").is_ok());
            assert!(CookbookName::new("pd_nginx_extra").is_ok());
        }

        #[test]
        fn invalid_names() {
            assert!(CookbookName::new("apache").is_err());
            assert!(CookbookName::new("_apache").is_err());
            assert!(CookbookName::new("fb_").is_err());
            assert!(CookbookName::new("fb_a/b").is_err());
        }

        #[test]
        fn prefix_match_requires_separator() {
            let name = CookbookName::new("fbx_apache").unwrap();
            assert!(!name.has_prefix("fb"));
            assert!(name.has_prefix("fbx"));
        }
    }
}
