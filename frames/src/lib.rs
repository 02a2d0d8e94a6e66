//! Shared chat wire model and event-stream decoding.
//!
//! This crate owns the representation that crosses the chat boundary and is
//! used by both `relay` and `cli`: the conversation messages, the language
//! selector, the request/error bodies, and the decoder that turns the relayed
//! `data: {json}` byte stream back into text fragments.

pub mod stream;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use stream::{DecodeSummary, StreamDecoder, StreamLine};

/// Error returned when a `data:` payload is not a valid delta document.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload text could not be parsed as JSON.
    #[error("failed to parse stream payload: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// =============================================================================
// LANGUAGE
// =============================================================================

/// Language selector carried by a chat request.
///
/// Selects the system prompt attached by the relay. Unknown or missing
/// selectors resolve to [`Language::En`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Sn,
    Nd,
}

impl Language {
    pub const ALL: [Self; 3] = [Self::En, Self::Sn, Self::Nd];

    /// Resolve a raw selector, falling back to English for anything unrecognized.
    #[must_use]
    pub fn from_selector(raw: Option<&str>) -> Self {
        match raw {
            Some("sn") => Self::Sn,
            Some("nd") => Self::Nd,
            _ => Self::En,
        }
    }

    /// Wire code, e.g. `"sn"`.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Sn => "sn",
            Self::Nd => "nd",
        }
    }

    /// Human-readable name shown in language pickers.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Sn => "Shona",
            Self::Nd => "Ndebele",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// REQUEST / ERROR BODIES
// =============================================================================

/// Body of `POST /chat`.
///
/// `language` stays a raw string so that a bad selector never fails parsing;
/// use [`ChatRequest::language`] to resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ChatRequest {
    #[must_use]
    pub fn language(&self) -> Language {
        Language::from_selector(self.language.as_deref())
    }
}

/// JSON error payload returned by the relay on every failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

// =============================================================================
// DELTA PAYLOAD
// =============================================================================

/// Extract `choices[0].delta.content` from one `data:` payload.
///
/// Returns `Ok(None)` for any valid JSON document that carries no text
/// (role-only deltas, finish markers, usage blocks, unexpected shapes).
///
/// # Errors
///
/// Returns [`DecodeError::Json`] when the payload is not a complete JSON
/// document.
pub fn parse_delta_content(payload: &str) -> Result<Option<String>, DecodeError> {
    let root: Value = serde_json::from_str(payload)?;
    Ok(root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .map(str::to_owned))
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
