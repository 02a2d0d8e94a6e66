//! Chat relay route: conversation in, upstream event stream out.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use frames::ChatRequest;
use futures::{Stream, StreamExt};

use crate::error::RelayError;
use crate::llm::config::API_KEY_VAR;
use crate::llm::types::{ByteStream, LlmError};
use crate::prompts;
use crate::state::AppState;

const EVENT_STREAM: &str = "text/event-stream";

/// `POST /chat`: attach the system prompt and stream the upstream reply back.
///
/// The body is taken as raw bytes so that malformed JSON maps to a relay
/// error payload instead of axum's extractor rejection.
///
/// # Errors
///
/// See [`RelayError`] for the status mapping.
pub async fn relay_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, RelayError> {
    authorize(&state, &headers)?;

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| RelayError::InvalidBody(e.to_string()))?;
    let language = request.language();
    tracing::info!(%language, messages = request.messages.len(), "chat request received");

    let Some(upstream) = state.upstream.as_ref() else {
        return Err(RelayError::NotConfigured { var: API_KEY_VAR.into() });
    };

    let stream = upstream
        .stream_chat(prompts::system_prompt(language), &request.messages)
        .await
        .map_err(upstream_failure)?;

    let body = Body::from_stream(with_idle_timeout(stream, state.idle_timeout));
    Ok(([(CONTENT_TYPE, EVENT_STREAM)], body).into_response())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), RelayError> {
    let Some(expected) = state.access_key.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if presented == Some(expected) { Ok(()) } else { Err(RelayError::Unauthorized) }
}

/// Translate an upstream failure, logging what the client will not see.
fn upstream_failure(err: LlmError) -> RelayError {
    match err {
        LlmError::ApiResponse { status: 429, .. } => {
            tracing::warn!("upstream rate limited");
            RelayError::RateLimited
        }
        LlmError::ApiResponse { status: 402, .. } => {
            tracing::warn!("upstream payment required");
            RelayError::Unavailable
        }
        LlmError::ApiResponse { status, body } => {
            tracing::error!(status, body = %body, "upstream error");
            RelayError::Upstream { status }
        }
        LlmError::MissingApiKey { var } => RelayError::NotConfigured { var },
        err @ (LlmError::ApiRequest(_) | LlmError::Timeout { .. } | LlmError::HttpClientBuild(_)) => {
            tracing::error!(error = %err, "upstream unreachable");
            RelayError::Unreachable
        }
    }
}

/// Forward `stream` chunk by chunk, ending it with an error if the upstream
/// goes quiet for longer than `idle`.
pub(crate) fn with_idle_timeout(stream: ByteStream, idle: Duration) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    futures::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(stream))),
            Ok(Some(Err(err))) => {
                tracing::warn!(error = %err, "upstream stream failed");
                Some((Err(err), None))
            }
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(idle_secs = idle.as_secs(), "upstream stream idle timeout");
                Some((Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream idle timeout")), None))
            }
        }
    })
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
