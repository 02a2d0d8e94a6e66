//! OpenAI-compatible streaming chat-completions client.
//!
//! Sends `{ model, messages: [system, ...history], stream: true }` to
//! `<base_url>/chat/completions` and hands back the response body as an
//! unread byte stream. Nothing in the body is parsed here.

use std::time::Duration;

use frames::{Message, Role};
use futures::TryStreamExt;
use serde::Serialize;

use super::config::{LlmConfig, LlmTimeouts};
use super::types::{ByteStream, LlmError};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    response_timeout: Duration,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the reqwest client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let LlmTimeouts { connect_secs, response_secs, .. } = config.timeouts;
        // Body reads are bounded by the route's idle timeout, not a request timeout.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url,
            model: config.model,
            response_timeout: Duration::from_secs(response_secs),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a streamed completion.
    ///
    /// # Errors
    ///
    /// - [`LlmError::ApiRequest`] when the request cannot be sent.
    /// - [`LlmError::Timeout`] when headers do not arrive in time.
    /// - [`LlmError::ApiResponse`] for any non-2xx status, with the upstream body.
    pub async fn stream_chat(&self, system: &str, messages: &[Message]) -> Result<ByteStream, LlmError> {
        let msgs = build_chat_messages(system, messages);
        let body = CcRequest { model: &self.model, messages: &msgs, stream: true };
        let url = format!("{}/chat/completions", self.base_url);

        let send = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(self.response_timeout, send)
            .await
            .map_err(|_| LlmError::Timeout { secs: self.response_timeout.as_secs() })?
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = tokio::time::timeout(self.response_timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(LlmError::ApiResponse { status: status.as_u16(), body: text });
        }

        Ok(Box::pin(response.bytes_stream().map_err(std::io::Error::other)))
    }
}

// =============================================================================
// CHAT COMPLETIONS WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    messages: &'a [CcMessage<'a>],
    stream: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn build_chat_messages<'a>(system: &'a str, messages: &'a [Message]) -> Vec<CcMessage<'a>> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(CcMessage { role: "system", content: system });
    out.extend(
        messages
            .iter()
            .map(|m| CcMessage { role: role_name(m.role), content: &m.content }),
    );
    out
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
