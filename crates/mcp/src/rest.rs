//! REST transport: one JSON-RPC message per HTTP POST.

use crate::auth::AuthContext;
use crate::config::HEALTH_PATH;
use crate::server::{McpServer, SERVER_NAME};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

/// Bind `0.0.0.0:<port>` and serve MCP requests at `endpoint`.
pub async fn serve(server: McpServer, port: u16, endpoint: &str) -> Result<()> {
    let app = create_router(server, endpoint);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, endpoint, "MCP REST server listening");

    axum::serve(listener, app).await.context("REST server failed")?;

    Ok(())
}

/// Create the MCP router
pub fn create_router(server: McpServer, endpoint: &str) -> Router {
    Router::new()
        .route(endpoint, post(handle_rpc))
        .route(HEALTH_PATH, get(health_check))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .with_state(server)
}

/// Handle one JSON-RPC message.
///
/// The body is taken as raw bytes so malformed JSON becomes a JSON-RPC
/// parse error rather than an HTTP 4xx.
async fn handle_rpc(State(server): State<McpServer>, headers: HeaderMap, body: Bytes) -> Response {
    let auth = AuthContext::from_headers(&headers);

    let message = String::from_utf8_lossy(&body);

    match server.handle_message(&message, auth).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
