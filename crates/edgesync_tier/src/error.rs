// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache tier operations.

/// The cache tier could not complete an operation.
///
/// This is an opaque error that wraps whatever went wrong inside a tier implementation. Use
/// [`std::error::Error::source()`] to reach the underlying cause.
///
/// # Example
///
/// ```
/// use edgesync_tier::Error;
///
/// let error = Error::from_message("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates a new error from any type that can be converted to an error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for cache tier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_cause_message() {
        let error = Error::from_message("tier offline");
        let display = format!("{error}");
        assert!(display.contains("tier offline"), "display output should contain the cause, got: {display}");
    }

    #[test]
    fn result_alias_propagates_errors() {
        fn fails() -> Result<u64> {
            Err(Error::caused_by("expected failure"))
        }

        let err = fails().expect_err("should return an error");
        assert!(format!("{err:?}").contains("expected failure"));
    }
}
