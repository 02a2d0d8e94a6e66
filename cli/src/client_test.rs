use super::*;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use frames::{Language, Message, Role};
use serde_json::Value;

// =============================================================================
// STUB RELAY
// =============================================================================

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl Captured {
    fn take(&self) -> Vec<(Option<String>, Value)> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

async fn spawn_relay(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn sse_body(chunks: &[&'static str], hang: bool) -> Body {
    let items: Vec<std::io::Result<Bytes>> = chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
    let stream = futures::stream::iter(items);
    if hang {
        Body::from_stream(stream.chain(futures::stream::pending()))
    } else {
        Body::from_stream(stream)
    }
}

/// Relay that records each request and replies by echoing the last user
/// message back as a two-fragment stream.
async fn echo_relay(captured: Captured) -> String {
    async fn handler(State(captured): State<Captured>, headers: HeaderMap, body: String) -> Response {
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
        let json: Value = serde_json::from_str(&body).unwrap();
        let last = json["messages"].as_array().and_then(|m| m.last()).map(|m| m["content"].as_str().unwrap_or_default().to_owned()).unwrap_or_default();
        captured.requests.lock().unwrap().push((auth, json));

        let first = serde_json::json!({"choices": [{"delta": {"content": "re: "}}]});
        let second = serde_json::json!({"choices": [{"delta": {"content": last}}]});
        let text = format!("data: {first}\n\n: keep-alive\n\ndata: {second}\n\ndata: [DONE]\n\n");
        ([("content-type", "text/event-stream")], text).into_response()
    }
    spawn_relay(Router::new().route("/chat", post(handler)).with_state(captured)).await
}

async fn fixed_relay(status: StatusCode, body: Body) -> String {
    let body = Mutex::new(Some(body));
    let body = Arc::new(body);
    let handler = move || {
        let body = body.clone();
        async move {
            let body = body.lock().unwrap().take().unwrap_or_else(Body::empty);
            (status, [("content-type", "text/event-stream")], body).into_response()
        }
    };
    spawn_relay(Router::new().route("/chat", post(handler))).await
}

fn timeouts(response: Duration, idle: Duration) -> ClientTimeouts {
    ClientTimeouts { connect: Duration::from_secs(2), response, idle }
}

fn client(base: &str) -> RelayClient {
    RelayClient::new(base, Some("anon-key".into()), timeouts(Duration::from_secs(5), Duration::from_secs(5))).unwrap()
}

// =============================================================================
// SUCCESS
// =============================================================================

#[tokio::test]
async fn streamed_reply_lands_in_session_and_callback() {
    let captured = Captured::default();
    let base = echo_relay(captured.clone()).await;
    let mut session = ChatSession::new(Language::Sn);
    let mut seen = Vec::new();

    let outcome = client(&base)
        .send(&mut session, "  mhoro  ", &CancellationToken::new(), |f| seen.push(f.to_owned()))
        .await
        .unwrap();

    assert_eq!(outcome.end, StreamEnd::Terminator);
    assert_eq!(outcome.fragments, 2);
    assert_eq!(seen, vec!["re: ", "mhoro"]);
    assert_eq!(session.messages(), &[Message::user("mhoro"), Message::assistant("re: mhoro")]);
    assert!(!session.is_busy());

    let requests = captured.take();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer anon-key"));
    assert_eq!(body["language"], "sn");
    assert_eq!(body["messages"], serde_json::json!([{"role": "user", "content": "mhoro"}]));
}

#[tokio::test]
async fn two_turns_alternate_roles_and_resend_history() {
    let captured = Captured::default();
    let base = echo_relay(captured.clone()).await;
    let relay = client(&base);
    let mut session = ChatSession::default();
    let cancel = CancellationToken::new();

    relay.send(&mut session, "one", &cancel, |_| {}).await.unwrap();
    relay.send(&mut session, "two", &cancel, |_| {}).await.unwrap();

    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(session.messages()[3].content, "re: two");

    let requests = captured.take();
    assert_eq!(requests[1].1["messages"].as_array().unwrap().len(), 3);
    assert_eq!(requests[1].1["messages"][1], serde_json::json!({"role": "assistant", "content": "re: one"}));
}

#[tokio::test]
async fn blank_input_never_reaches_the_relay() {
    let captured = Captured::default();
    let base = echo_relay(captured.clone()).await;
    let mut session = ChatSession::default();

    let err = client(&base).send(&mut session, "   ", &CancellationToken::new(), |_| {}).await.unwrap_err();

    assert!(matches!(err, ChatError::Send(SendError::EmptyMessage)));
    assert!(captured.take().is_empty());
    assert!(session.messages().is_empty());
}

// =============================================================================
// REFUSALS
// =============================================================================

#[tokio::test]
async fn rate_limited_reply_removes_placeholder() {
    let base = fixed_relay(
        StatusCode::TOO_MANY_REQUESTS,
        Body::from(r#"{"error":"Rate limit exceeded. Please try again in a moment."}"#),
    )
    .await;
    let mut session = ChatSession::default();

    let err = client(&base).send(&mut session, "hi", &CancellationToken::new(), |_| {}).await.unwrap_err();

    assert!(matches!(err, ChatError::RateLimited));
    assert!(err.to_string().starts_with("Too many requests"));
    assert_eq!(session.messages(), &[Message::user("hi")]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn payment_required_is_service_unavailable() {
    let base = fixed_relay(StatusCode::PAYMENT_REQUIRED, Body::empty()).await;
    let mut session = ChatSession::default();

    let err = client(&base).send(&mut session, "hi", &CancellationToken::new(), |_| {}).await.unwrap_err();

    assert!(matches!(err, ChatError::Unavailable));
    assert!(err.to_string().starts_with("Service unavailable"));
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn other_failure_status_is_generic_error() {
    let base = fixed_relay(StatusCode::INTERNAL_SERVER_ERROR, Body::from(r#"{"error":"boom"}"#)).await;
    let mut session = ChatSession::default();

    let err = client(&base).send(&mut session, "hi", &CancellationToken::new(), |_| {}).await.unwrap_err();

    assert!(matches!(err, ChatError::Failed { status: 500 }));
    assert_eq!(err.to_string(), "Error: Failed to send message. Please try again.");
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn unreachable_relay_is_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let mut session = ChatSession::default();

    let err = client(&format!("http://{addr}"))
        .send(&mut session, "hi", &CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Connect(_)));
    assert!(err.to_string().starts_with("Connection error"));
    assert_eq!(session.messages(), &[Message::user("hi")]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn relay_that_never_answers_times_out_and_removes_placeholder() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });
    let relay =
        RelayClient::new(&format!("http://{addr}"), None, timeouts(Duration::from_millis(100), Duration::from_secs(5)))
            .unwrap();
    let mut session = ChatSession::default();

    let err = tokio::time::timeout(
        Duration::from_secs(3),
        relay.send(&mut session, "hi", &CancellationToken::new(), |_| {}),
    )
    .await
    .expect("header wait should be bounded")
    .unwrap_err();
    held.abort();

    assert!(matches!(err, ChatError::NoResponse));
    assert!(err.to_string().starts_with("Connection error"));
    assert_eq!(session.messages(), &[Message::user("hi")]);
    assert!(!session.is_busy());
}

// =============================================================================
// INTERRUPTED STREAMS
// =============================================================================

#[tokio::test]
async fn truncated_stream_keeps_partial_reply() {
    let body = sse_body(
        &["data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n", "data: {\"choices\":[{\"delta\":{\"cont"],
        false,
    );
    let base = fixed_relay(StatusCode::OK, body).await;
    let mut session = ChatSession::default();

    let outcome = client(&base).send(&mut session, "hi", &CancellationToken::new(), |_| {}).await.unwrap();

    assert_eq!(outcome.end, StreamEnd::Closed);
    assert_eq!(outcome.dropped_lines, 1);
    assert_eq!(session.messages()[1], Message::assistant("Hel"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn stream_without_content_leaves_no_empty_reply() {
    let base = fixed_relay(StatusCode::OK, sse_body(&["data: [DONE]\n\n"], false)).await;
    let mut session = ChatSession::default();

    let outcome = client(&base).send(&mut session, "hi", &CancellationToken::new(), |_| {}).await.unwrap();

    assert_eq!(outcome.end, StreamEnd::Terminator);
    assert_eq!(session.messages(), &[Message::user("hi")]);
}

#[tokio::test]
async fn cancelling_mid_stream_keeps_partial_reply() {
    let body = sse_body(&["data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n"], true);
    let base = fixed_relay(StatusCode::OK, body).await;
    let mut session = ChatSession::default();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client(&base).send(&mut session, "hi", &cancel, move |_| trigger.cancel()),
    )
    .await
    .expect("cancel should stop the read loop")
    .unwrap();

    assert_eq!(outcome.end, StreamEnd::Interrupted);
    assert_eq!(session.messages()[1], Message::assistant("Hel"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn cancelled_before_headers_removes_placeholder() {
    let base = fixed_relay(StatusCode::OK, sse_body(&["data: [DONE]\n\n"], false)).await;
    let mut session = ChatSession::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client(&base).send(&mut session, "hi", &cancel, |_| {}).await.unwrap_err();

    assert!(matches!(err, ChatError::Cancelled));
    assert_eq!(session.messages(), &[Message::user("hi")]);
}

#[tokio::test]
async fn stalled_stream_hits_idle_timeout() {
    let body = sse_body(&["data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n"], true);
    let base = fixed_relay(StatusCode::OK, body).await;
    let relay = RelayClient::new(&base, None, timeouts(Duration::from_secs(5), Duration::from_millis(100))).unwrap();
    let mut session = ChatSession::default();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        relay.send(&mut session, "hi", &CancellationToken::new(), |_| {}),
    )
    .await
    .expect("idle timeout should fire")
    .unwrap();

    assert_eq!(outcome.end, StreamEnd::Interrupted);
    assert_eq!(session.messages()[1].content, "Hel");
}

#[test]
fn chat_url_joins_base_without_double_slash() {
    let relay = RelayClient::new("http://relay.local/", None, ClientTimeouts::default()).unwrap();
    assert_eq!(relay.chat_url(), "http://relay.local/chat");
}
