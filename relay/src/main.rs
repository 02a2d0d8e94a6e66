mod error;
mod llm;
mod prompts;
mod routes;
mod state;

use std::time::Duration;

use llm::config::LlmTimeouts;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    // Missing key is non-fatal: chat requests report it until configured.
    let upstream = match llm::optional_upstream(llm::LlmClient::from_env()).expect("LLM client init failed") {
        Some(client) => {
            tracing::info!(model = client.model(), base_url = client.base_url(), "LLM client initialized");
            Some(std::sync::Arc::new(client) as std::sync::Arc<dyn llm::ChatUpstream>)
        }
        None => {
            tracing::warn!(var = llm::config::API_KEY_VAR, "LLM client not configured; chat requests will fail");
            None
        }
    };

    let access_key = std::env::var("RELAY_ACCESS_KEY").ok().filter(|k| !k.trim().is_empty());
    if access_key.is_some() {
        tracing::info!("chat requests require RELAY_ACCESS_KEY bearer");
    }

    let idle_timeout = Duration::from_secs(LlmTimeouts::from_env().idle_secs);
    let state = state::AppState::new(upstream, idle_timeout, access_key);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "shinga relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
