//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only immutable configuration and the upstream client; nothing in it
//! is mutated per request, so concurrent chats never contend.

use std::sync::Arc;
use std::time::Duration;

use crate::llm::ChatUpstream;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Upstream client. `None` if `LLM_API_KEY` is not configured.
    pub upstream: Option<Arc<dyn ChatUpstream>>,
    /// Longest allowed gap between two forwarded body chunks.
    pub idle_timeout: Duration,
    /// Bearer key required on chat requests, when set.
    pub access_key: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(upstream: Option<Arc<dyn ChatUpstream>>, idle_timeout: Duration, access_key: Option<String>) -> Self {
        Self { upstream, idle_timeout, access_key }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
