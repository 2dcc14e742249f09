//! core::trailer
//!
//! Provenance trailers in commit messages.
//!
//! # Wire format
//!
//! A trailer is a `Key: value` line in the trailing block of a commit
//! message (the last paragraph, separated from the body by a blank line).
//! The bot writes one trailer per cherry-picked commit:
//!
//! ```text
//! Bump apache to 2.4.58
//!
//! Upstream-Commit: abc1234def5678abc1234def5678abc1234def56
//! ```
//!
//! A commit may carry several trailers. Squash merges concatenate the
//! messages of every squashed commit, so provenance values are recognized on
//! any line of the message, not only in the final block.

/// A single `Key: value` trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub key: String,
    pub value: String,
}

impl Trailer {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse one line as a trailer.
    ///
    /// The key must be a single token of letters, digits, `-` or `_`, and the
    /// value must be non-empty.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once(':')?;
        let value = value.trim();
        let key_ok = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !key_ok || value.is_empty() {
            return None;
        }
        Some(Self::new(key, value))
    }
}

impl std::fmt::Display for Trailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// Trailers in the final block of `message`.
///
/// The final block is the last paragraph, and only counts when every line
/// in it parses as a trailer and the message has a body before it.
pub fn parse_trailers(message: &str) -> Vec<Trailer> {
    let paragraphs = paragraphs(message);
    let [_, .., last] = paragraphs.as_slice() else {
        return Vec::new();
    };
    let parsed: Option<Vec<Trailer>> = last.iter().map(|l| Trailer::parse_line(l)).collect();
    parsed.unwrap_or_default()
}

/// Every value recorded under `key` anywhere in `message`, in message order.
///
/// Keys compare case-insensitively. Only values that look like commit SHAs
/// (7-64 hex characters) are returned.
pub fn values_for(message: &str, key: &str) -> Vec<String> {
    message
        .lines()
        .filter_map(Trailer::parse_line)
        .filter(|t| t.key.eq_ignore_ascii_case(key) && looks_like_sha(&t.value))
        .map(|t| t.value.to_ascii_lowercase())
        .collect()
}

/// Append `key: value` to the message's trailer block, starting one if needed.
///
/// The trailer is always added, even when an identical line exists, so
/// provenance never depends on text copied from upstream.
///
/// ```
/// use linecook::core::trailer::append_trailer;
///
/// let msg = append_trailer("Fix apache\n\nDetails here.\n", "Upstream-Commit", "abc1234");
/// assert_eq!(msg, "Fix apache\n\nDetails here.\n\nUpstream-Commit: abc1234\n");
///
/// let again = append_trailer(&msg, "Upstream-Commit", "def5678");
/// assert!(again.ends_with("Upstream-Commit: abc1234\nUpstream-Commit: def5678\n"));
/// ```
pub fn append_trailer(message: &str, key: &str, value: &str) -> String {
    let trimmed = message.trim_end();
    let line = format!("{key}: {value}");
    if trimmed.is_empty() {
        return format!("{line}\n");
    }
    if parse_trailers(trimmed).is_empty() {
        format!("{trimmed}\n\n{line}\n")
    } else {
        format!("{trimmed}\n{line}\n")
    }
}

fn paragraphs(message: &str) -> Vec<Vec<&str>> {
    let mut out: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in message.trim_end().lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn looks_like_sha(value: &str) -> bool {
    (7..=64).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}
