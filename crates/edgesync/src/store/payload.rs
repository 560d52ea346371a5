// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Maximum length of a title, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

/// Why a write was rejected before reaching the durable store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The title is empty or only whitespace.
    #[error("title must not be empty")]
    EmptyTitle,
    /// The title is longer than [`MAX_TITLE_CHARS`].
    #[error("title is {len} characters long, the limit is {max}")]
    TitleTooLong {
        /// Length of the rejected title.
        len: usize,
        /// The limit.
        max: usize,
    },
    /// A patch that changes nothing.
    #[error("patch must change at least one field")]
    EmptyPatch,
    /// An update or delete without an expected validator.
    #[error("an If-Match validator is required for this write")]
    MissingPrecondition,
    /// The input does not have the expected shape.
    #[error("malformed input: {0}")]
    Malformed(String),
}

/// The structured content of a record.
///
/// Unknown fields are rejected when deserializing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    /// Short description of the item.
    pub title: String,
    /// Whether the item is done.
    #[serde(default)]
    pub completed: bool,
}

impl Payload {
    /// Creates a payload. Call [`validate`](Self::validate) before writing it.
    #[must_use]
    pub fn new(title: impl Into<String>, completed: bool) -> Self {
        Self {
            title: title.into(),
            completed,
        }
    }

    /// Decodes a payload from untyped JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] if `value` is not an object, or if fields are
    /// missing, unknown or of the wrong type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        decode_object(value)
    }

    /// Normalizes and checks the payload.
    ///
    /// The title is trimmed; it must then be non-empty and at most [`MAX_TITLE_CHARS`] long.
    ///
    /// # Errors
    ///
    /// Returns the first rule the payload breaks.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: validate_title(&self.title)?,
            completed: self.completed,
        })
    }
}

/// A partial update to a record's payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    /// New title, if it changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New completion state, if it changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the new completion state.
    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Returns `true` if the patch changes no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }

    /// Decodes a patch from untyped JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] if `value` is not an object, or if fields are
    /// unknown or of the wrong type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        decode_object(value)
    }

    /// Normalizes and checks the patch.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] for a patch that changes nothing, or the title
    /// rule the new title breaks.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }

        Ok(Self {
            title: self.title.as_deref().map(validate_title).transpose()?,
            completed: self.completed,
        })
    }

    /// Applies the patch on top of `payload`.
    #[must_use]
    pub fn apply_to(&self, payload: &Payload) -> Payload {
        Payload {
            title: self.title.clone().unwrap_or_else(|| payload.title.clone()),
            completed: self.completed.unwrap_or(payload.completed),
        }
    }
}

/// Decodes `value` as `T`, accepting only a JSON object.
fn decode_object<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, ValidationError> {
    let kind = match value {
        serde_json::Value::Object(_) => {
            return T::deserialize(value).map_err(|e| ValidationError::Malformed(e.to_string()));
        }
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
    };
    Err(ValidationError::Malformed(format!("expected a JSON object, found {kind}")))
}

fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TITLE_CHARS,
        });
    }

    Ok(title.to_owned())
}
