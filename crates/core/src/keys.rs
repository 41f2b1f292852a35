//! Validated registry keys for task types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum allowed length for a [`TaskKey`].
const TASK_KEY_MAX_LEN: usize = 64;

/// Errors from constructing a [`TaskKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskKeyError {
    /// The input was empty or contained only whitespace.
    #[error("task key cannot be empty or whitespace")]
    Empty,
    /// The normalized key contains characters other than `a-z`, `0-9` and `_`.
    #[error("task key contains invalid characters (only a-z, 0-9 and _ allowed)")]
    InvalidCharacters,
    /// The normalized key exceeds [`TASK_KEY_MAX_LEN`] characters.
    #[error("task key exceeds maximum length of {TASK_KEY_MAX_LEN} characters")]
    TooLong,
}

/// A normalized, validated identifier for a task type.
///
/// Task registries and persisted reports both refer to tasks by key, so the
/// key format is deliberately narrow: whatever the operator typed, the same
/// task resolves to the same key.
///
/// Normalization rules:
/// - Leading/trailing whitespace is trimmed.
/// - The string is lowercased.
/// - Whitespace and hyphens are replaced with underscores.
/// - Consecutive underscores are collapsed to one.
/// - Leading/trailing underscores are stripped.
///
/// After normalization the key must be non-empty, contain only `a-z`, `0-9`
/// and `_`, and be at most 64 characters long.
///
/// # Examples
///
/// ```
/// use warden_core::TaskKey;
///
/// let key: TaskKey = "Certification Activation".parse().unwrap();
/// assert_eq!(key.as_str(), "certification_activation");
///
/// let key: TaskKey = " Score--Refresh  v2 ".parse().unwrap();
/// assert_eq!(key.as_str(), "score_refresh_v2");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskKey(String);

impl TaskKey {
    /// Create a new `TaskKey`, normalizing and validating the input.
    pub fn new(raw: &str) -> Result<Self, TaskKeyError> {
        let normalized = normalize(raw);

        if normalized.is_empty() {
            return Err(TaskKeyError::Empty);
        }
        if !normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(TaskKeyError::InvalidCharacters);
        }
        if normalized.len() > TASK_KEY_MAX_LEN {
            return Err(TaskKeyError::TooLong);
        }

        Ok(Self(normalized))
    }

    /// Return the inner string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase, map separators to `_`, collapse runs, strip the ends.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.trim().len());
    for c in raw.trim().to_lowercase().chars() {
        let mapped = if c.is_ascii_whitespace() || c == '-' {
            '_'
        } else {
            c
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.len() == out.len() {
        out
    } else {
        trimmed.to_owned()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskKey {
    type Err = TaskKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for TaskKey {
    type Error = TaskKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for TaskKey {
    type Error = TaskKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TaskKey> for String {
    fn from(key: TaskKey) -> Self {
        key.0
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TaskKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for TaskKey {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_and_case() {
        let key: TaskKey = "Certification Activation".parse().unwrap();
        assert_eq!(key.as_str(), "certification_activation");
    }

    #[test]
    fn normalizes_hyphens() {
        let key: TaskKey = "score-refresh".parse().unwrap();
        assert_eq!(key.as_str(), "score_refresh");
    }

    #[test]
    fn accepts_digits() {
        let key: TaskKey = "phase 2 cleanup".parse().unwrap();
        assert_eq!(key.as_str(), "phase_2_cleanup");
    }

    #[test]
    fn collapses_underscores() {
        let key: TaskKey = "a___b".parse().unwrap();
        assert_eq!(key.as_str(), "a_b");
    }

    #[test]
    fn strips_leading_trailing_underscores() {
        let key: TaskKey = "___housekeeping___".parse().unwrap();
        assert_eq!(key.as_str(), "housekeeping");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let key: TaskKey = "  mitigation_expiry  ".parse().unwrap();
        assert_eq!(key.as_str(), "mitigation_expiry");
    }

    #[test]
    fn complex_normalization() {
        let key: TaskKey = " Score--Refresh  v2 ".parse().unwrap();
        assert_eq!(key.as_str(), "score_refresh_v2");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(TaskKey::new(""), Err(TaskKeyError::Empty));
        assert_eq!(TaskKey::new("   "), Err(TaskKeyError::Empty));
        assert_eq!(TaskKey::new("___"), Err(TaskKeyError::Empty));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert_eq!(
            TaskKey::new("cleanup!"),
            Err(TaskKeyError::InvalidCharacters)
        );
        assert_eq!(TaskKey::new("task@1"), Err(TaskKeyError::InvalidCharacters));
        assert_eq!(TaskKey::new("a.b"), Err(TaskKeyError::InvalidCharacters));
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(65);
        assert_eq!(TaskKey::new(&long), Err(TaskKeyError::TooLong));
    }

    #[test]
    fn accepts_max_length() {
        let exact = "a".repeat(64);
        assert!(TaskKey::new(&exact).is_ok());
    }

    #[test]
    fn display_and_equality() {
        let key: TaskKey = "housekeeping".parse().unwrap();
        assert_eq!(key.to_string(), "housekeeping");
        assert_eq!(key, "housekeeping");
        assert_eq!(key, *"housekeeping");
        assert_eq!(key, "housekeeping".to_string());
    }

    #[test]
    fn serde_roundtrip() {
        let key: TaskKey = "account_discovery".parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"account_discovery\"");

        let back: TaskKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn serde_normalizes_on_deserialize() {
        let back: TaskKey = serde_json::from_str("\"Account Discovery\"").unwrap();
        assert_eq!(back.as_str(), "account_discovery");
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<TaskKey, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn try_from_string() {
        let key = TaskKey::try_from("Entitlement Correlation".to_string()).unwrap();
        assert_eq!(key.as_str(), "entitlement_correlation");
    }

    #[test]
    fn into_string() {
        let key: TaskKey = "housekeeping".parse().unwrap();
        let s: String = key.into();
        assert_eq!(s, "housekeeping");
    }
}
