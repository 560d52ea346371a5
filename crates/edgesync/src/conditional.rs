// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Conditional reads.
//!
//! A client that already holds a value presents its validator; if it still matches the current
//! one, the response carries no body.

use edgesync_tier::Validator;

use crate::served::Served;

/// The validators a client already holds, as sent in an `If-None-Match` header.
///
/// # Examples
///
/// ```
/// use edgesync::IfNoneMatch;
/// use edgesync_tier::Validator;
///
/// let precondition = IfNoneMatch::parse(r#""r1", W/"r2""#).unwrap();
/// assert!(precondition.matches(&Validator::new("r2")));
/// assert!(!precondition.matches(&Validator::new("r3")));
///
/// assert!(IfNoneMatch::parse("*").unwrap().matches(&Validator::new("anything")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    /// `*`: any current value matches.
    Any,
    /// A list of validators.
    Tags(Vec<Validator>),
}

impl IfNoneMatch {
    /// Parses a header value: `*` or a comma-separated list of entity tags.
    ///
    /// Weak tags match like strong ones. Returns `None` if the value holds no tag.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        if header.trim() == "*" {
            return Some(Self::Any);
        }

        let tags: Vec<Validator> = header.split(',').filter_map(Validator::parse_etag).collect();
        (!tags.is_empty()).then_some(Self::Tags(tags))
    }

    /// Returns `true` if `current` is one of the presented validators.
    ///
    /// Comparison is exact.
    #[must_use]
    pub fn matches(&self, current: &Validator) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tags.contains(current),
        }
    }
}

impl From<Validator> for IfNoneMatch {
    fn from(validator: Validator) -> Self {
        Self::Tags(vec![validator])
    }
}

/// The outcome of a conditional read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation<V> {
    /// The client's copy is current. Carries the metadata of the current value without the value.
    NotModified(Served<()>),
    /// The client's copy is outdated, or it had none.
    Modified(Served<V>),
}

impl<V> Evaluation<V> {
    /// Returns `true` for [`NotModified`](Self::NotModified).
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified(_))
    }

    /// The current validator.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        match self {
            Self::NotModified(served) => served.validator(),
            Self::Modified(served) => served.validator(),
        }
    }
}

/// Compares the presented validators with the current value.
#[must_use]
pub fn evaluate<V>(precondition: &IfNoneMatch, current: Served<V>) -> Evaluation<V> {
    if precondition.matches(current.validator()) {
        Evaluation::NotModified(current.map(drop))
    } else {
        Evaluation::Modified(current)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use edgesync_tier::TtlPolicy;

    use super::*;

    fn served(validator: &str) -> Served<&'static str> {
        Served::from_origin("body", Validator::new(validator), SystemTime::UNIX_EPOCH, &TtlPolicy::default())
    }

    #[test]
    fn parse_handles_lists_quotes_and_weak_tags() {
        assert_eq!(
            IfNoneMatch::parse(r#" "r1" ,W/"r2",r3 "#),
            Some(IfNoneMatch::Tags(vec![
                Validator::new("r1"),
                Validator::new("r2"),
                Validator::new("r3"),
            ]))
        );
        assert_eq!(IfNoneMatch::parse(" * "), Some(IfNoneMatch::Any));
        assert_eq!(IfNoneMatch::parse(""), None);
        assert_eq!(IfNoneMatch::parse(r#" , "" "#), None);
    }

    #[test]
    fn matching_is_exact() {
        let precondition = IfNoneMatch::from(Validator::new("r1"));

        assert!(precondition.matches(&Validator::new("r1")));
        assert!(!precondition.matches(&Validator::new("r10")));
        assert!(!precondition.matches(&Validator::new("R1")));
    }

    #[test]
    fn current_validator_is_not_modified() {
        let evaluation = evaluate(&IfNoneMatch::from(Validator::new("r1")), served("r1"));

        assert!(evaluation.is_not_modified());
        assert_eq!(evaluation.validator().as_str(), "r1");
    }

    #[test]
    fn outdated_validator_gets_the_value() {
        let evaluation = evaluate(&IfNoneMatch::from(Validator::new("r1")), served("r2"));

        let Evaluation::Modified(served) = evaluation else {
            panic!("expected a modified response");
        };
        assert_eq!(*served.value(), "body");
        assert_eq!(served.validator().as_str(), "r2");
    }

    #[test]
    fn wildcard_matches_any_current_value() {
        assert!(evaluate(&IfNoneMatch::Any, served("l3-00ff")).is_not_modified());
    }
}
