//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay is called straight from browsers on other origins, so every
//! response carries a wildcard `Access-Control-Allow-Origin` plus the allow
//! list of request headers the chat page sends. `OPTIONS` preflights are
//! answered by the CORS layer before reaching any handler.

pub mod chat;

use axum::Router;
use axum::http::header::{ACCESS_CONTROL_ALLOW_HEADERS, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Request headers browsers may send to the relay.
pub const ALLOWED_HEADERS: [HeaderName; 4] = [
    AUTHORIZATION,
    HeaderName::from_static("x-client-info"),
    HeaderName::from_static("apikey"),
    CONTENT_TYPE,
];

const ALLOWED_HEADERS_VALUE: &str = "authorization, x-client-info, apikey, content-type";

/// Relay routes with CORS and request tracing applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(ALLOWED_HEADERS);

    Router::new()
        .route("/chat", post(chat::relay_chat))
        .route("/functions/v1/chat", post(chat::relay_chat))
        .route("/healthz", get(healthz))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS_VALUE),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
