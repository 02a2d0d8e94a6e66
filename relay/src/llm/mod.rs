//! LLM: upstream chat-completions adapter for the relay.
//!
//! DESIGN
//! ======
//! One provider: any OpenAI-compatible `/chat/completions` endpoint with
//! streaming enabled (the Lovable AI gateway by default). Configured from
//! environment variables. Routes depend on the [`ChatUpstream`] trait so that
//! tests can swap in canned streams.

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
use frames::Message;
pub use types::ChatUpstream;
use types::{ByteStream, LlmError};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete upstream client used by the running relay.
pub struct LlmClient {
    inner: openai::OpenAiClient,
}

impl LlmClient {
    /// Build an upstream client from environment variables.
    ///
    /// See [`LlmConfig::from_env`] for the variables read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self { inner: openai::OpenAiClient::new(config)? })
    }

    /// Configured model name (e.g. `"google/gemini-2.5-flash"`).
    #[must_use]
    pub fn model(&self) -> &str {
        self.inner.model()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }
}

/// Startup policy for the upstream client.
///
/// A missing API key leaves chat unconfigured (`Ok(None)`) so the relay can
/// still start; any other construction failure is returned.
///
/// # Errors
///
/// Returns every [`LlmError`] except [`LlmError::MissingApiKey`].
pub fn optional_upstream(result: Result<LlmClient, LlmError>) -> Result<Option<LlmClient>, LlmError> {
    match result {
        Ok(client) => Ok(Some(client)),
        Err(LlmError::MissingApiKey { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait::async_trait]
impl ChatUpstream for LlmClient {
    async fn stream_chat(&self, system: &str, messages: &[Message]) -> Result<ByteStream, LlmError> {
        self.inner.stream_chat(system, messages).await
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
