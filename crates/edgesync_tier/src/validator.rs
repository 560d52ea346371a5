// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// An opaque version token for a served value.
///
/// A validator changes whenever the underlying value changes. Two validators are equal only when
/// their string forms are identical; there is no ordering or partial matching.
///
/// Transports render validators as entity tags with [`to_etag`](Self::to_etag) and read them back
/// with [`parse_etag`](Self::parse_etag).
///
/// # Examples
///
/// ```
/// use edgesync_tier::Validator;
///
/// let validator = Validator::new("r7");
/// assert_eq!(validator.to_etag(), "\"r7\"");
/// assert_eq!(Validator::parse_etag("W/\"r7\""), Some(validator));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct Validator(String);

impl Validator {
    /// Creates a validator from its opaque string form.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the opaque string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the validator as a strong entity tag (quoted).
    #[must_use]
    pub fn to_etag(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parses a single entity tag.
    ///
    /// Surrounding whitespace, the weak `W/` prefix and the enclosing quotes are removed.
    /// Unquoted tags are accepted as-is. Returns `None` for an empty tag.
    #[must_use]
    pub fn parse_etag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(tag);

        (!tag.is_empty()).then(|| Self::new(tag))
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Validator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
