//! Relay transport: send one turn and stream the reply into a session.

use std::time::Duration;

use frames::{ChatRequest, StreamDecoder};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::session::{ChatSession, SendError};

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Failures that end a turn before any reply was streamed.
///
/// Display strings are what the terminal shows the user.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("Connection error: Failed to connect to the chat service. Please try again.")]
    Connect(#[source] reqwest::Error),
    #[error("Connection error: The chat service did not respond. Please try again.")]
    NoResponse,
    #[error("Too many requests: Please wait a moment before sending another message.")]
    RateLimited,
    #[error("Service unavailable: The service is temporarily unavailable. Please try again later.")]
    Unavailable,
    #[error("Error: Failed to send message. Please try again.")]
    Failed { status: u16 },
    #[error("Cancelled.")]
    Cancelled,
}

/// How the reply stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// `data: [DONE]` was seen.
    Terminator,
    /// The relay closed the body without a terminator.
    Closed,
    /// Cancelled, read error, or idle timeout. Partial text is kept.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub end: StreamEnd,
    pub fragments: usize,
    pub dropped_lines: usize,
}

/// Limits on how long a turn may wait on the relay.
///
/// `response` bounds the wait for response headers; `idle` bounds the gap
/// between two body chunks once the reply is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub response: Duration,
    pub idle: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            response: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
            idle: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

pub struct RelayClient {
    http: reqwest::Client,
    chat_url: String,
    token: Option<String>,
    timeouts: ClientTimeouts,
}

impl RelayClient {
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeouts: ClientTimeouts) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().connect_timeout(timeouts.connect).build()?;
        Ok(Self {
            http,
            chat_url: format!("{}/chat", base_url.trim_end_matches('/')),
            token,
            timeouts,
        })
    }

    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Send `input` as the next user turn and stream the reply.
    ///
    /// `on_fragment` sees every content fragment as it is appended to the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] when the turn could not start or the relay
    /// refused it; the open reply is removed from the session in that case.
    /// Problems after the stream opened are reported through
    /// [`TurnOutcome::end`] instead.
    pub async fn send<F>(
        &self,
        session: &mut ChatSession,
        input: &str,
        cancel: &CancellationToken,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        let request = session.begin_turn(input)?;

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ChatError::Cancelled),
            result = tokio::time::timeout(self.timeouts.response, self.post(&request)) => {
                result.unwrap_or_else(|_| {
                    tracing::warn!(
                        response_secs = self.timeouts.response.as_secs(),
                        url = %self.chat_url,
                        "relay sent no response headers in time"
                    );
                    Err(ChatError::NoResponse)
                })
            }
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                session.abort_turn();
                return Err(err);
            }
        };

        let outcome = self.read_reply(session, response, cancel, &mut on_fragment).await;
        session.finish_turn();
        Ok(outcome)
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response, ChatError> {
        let mut builder = self.http.post(&self.chat_url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|err| {
            tracing::warn!(error = %err, url = %self.chat_url, "relay unreachable");
            ChatError::Connect(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        tracing::warn!(status = status.as_u16(), "relay rejected chat request");
        Err(match status.as_u16() {
            429 => ChatError::RateLimited,
            402 => ChatError::Unavailable,
            status => ChatError::Failed { status },
        })
    }

    async fn read_reply<F>(
        &self,
        session: &mut ChatSession,
        response: reqwest::Response,
        cancel: &CancellationToken,
        on_fragment: &mut F,
    ) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = StreamDecoder::new();
        let mut fragments = 0;
        let mut emit = |batch: Vec<String>| {
            for fragment in batch {
                session.append_fragment(&fragment);
                on_fragment(&fragment);
                fragments += 1;
            }
        };

        let end = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("reply cancelled");
                    break StreamEnd::Interrupted;
                }
                next = tokio::time::timeout(self.timeouts.idle, body.next()) => next,
            };
            match next {
                Ok(Some(Ok(chunk))) => {
                    emit(decoder.push(&chunk));
                    if decoder.is_done() {
                        break StreamEnd::Terminator;
                    }
                }
                Ok(Some(Err(err))) => {
                    tracing::warn!(error = %err, "reply stream failed");
                    break StreamEnd::Interrupted;
                }
                Ok(None) => break StreamEnd::Closed,
                Err(_) => {
                    tracing::warn!(idle_secs = self.timeouts.idle.as_secs(), "reply stream idle timeout");
                    break StreamEnd::Interrupted;
                }
            }
        };
        drop(body);

        let (tail, summary) = decoder.finish();
        emit(tail);
        if summary.dropped_lines > 0 {
            tracing::warn!(dropped = summary.dropped_lines, "unparsed stream lines dropped");
        }

        let end = if end == StreamEnd::Closed && summary.terminated { StreamEnd::Terminator } else { end };
        TurnOutcome { end, fragments, dropped_lines: summary.dropped_lines }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
