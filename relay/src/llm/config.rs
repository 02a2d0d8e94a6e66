//! Upstream configuration parsed from environment variables.

use super::types::LlmError;

pub const API_KEY_VAR: &str = "LLM_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Timeouts guarding against a stalled upstream.
///
/// `response_secs` bounds the wait for response headers; `idle_secs` bounds
/// the gap between two streamed body chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub connect_secs: u64,
    pub response_secs: u64,
    pub idle_secs: u64,
}

impl LlmTimeouts {
    /// Read timeouts from the environment, using defaults for unset or invalid values.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            connect_secs: env_parse_u64("LLM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            response_secs: env_parse_u64("LLM_RESPONSE_TIMEOUT_SECS", DEFAULT_RESPONSE_TIMEOUT_SECS),
            idle_secs: env_parse_u64("LLM_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl Default for LlmTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            response_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            idle_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeouts: LlmTimeouts,
}

impl LlmConfig {
    /// Build typed upstream config from environment variables.
    ///
    /// Required:
    /// - `LLM_API_KEY`
    ///
    /// Optional:
    /// - `LLM_MODEL`: default `google/gemini-2.5-flash`
    /// - `LLM_BASE_URL`: default Lovable AI gateway, trailing `/` stripped
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    /// - `LLM_RESPONSE_TIMEOUT_SECS`: default 60
    /// - `LLM_IDLE_TIMEOUT_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if `LLM_API_KEY` is unset or blank.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey { var: API_KEY_VAR.into() })?;

        let model = std::env::var("LLM_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { api_key, model, base_url, timeouts: LlmTimeouts::from_env() })
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
