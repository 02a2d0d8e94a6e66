//! Upstream types: error, streamed body, and the provider-neutral trait.

use axum::body::Bytes;
use frames::Message;
use futures::stream::BoxStream;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by upstream completion calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The required API key environment variable is not set.
    #[error("{var} is not configured")]
    MissingApiKey { var: String },

    /// The HTTP request to the upstream service failed before a response arrived.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// No response headers arrived within the configured window.
    #[error("API request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The upstream service returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// STREAMED BODY
// =============================================================================

/// Raw upstream event-stream bytes, chunk by chunk, exactly as received.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

// =============================================================================
// CHAT UPSTREAM TRAIT
// =============================================================================

/// Streaming chat-completions provider. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Start a streamed completion for `system` followed by `messages`.
    ///
    /// Resolves once response headers are in; the body is returned unread.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, header timeouts, and any non-2xx status.
    async fn stream_chat(&self, system: &str, messages: &[Message]) -> Result<ByteStream, LlmError>;
}
