// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// Identifies a cached resource.
///
/// Keys are deterministic functions of the resource they name. Keys that share a prefix form a
/// family that can be invalidated together with [`CacheTier::invalidate_prefix`](crate::CacheTier::invalidate_prefix).
///
/// # Examples
///
/// ```
/// use edgesync_tier::CacheKey;
///
/// let key = CacheKey::new("list:completed=any");
/// assert!(key.has_prefix("list:"));
/// assert_eq!(key.as_str(), "list:completed=any");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from its string form.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the string form of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the key starts with `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_is_literal() {
        let key = CacheKey::from("record:42");

        assert!(key.has_prefix("record:"));
        assert!(key.has_prefix(""));
        assert!(!key.has_prefix("list:"));
        assert!(!key.has_prefix("record:42:extra"));
    }

    #[test]
    fn display_matches_string_form() {
        let key = CacheKey::from(String::from("list:sort=title_asc"));
        assert_eq!(key.to_string(), "list:sort=title_asc");
    }
}
