use crate::api::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use genmedia_mcp::Notifier;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.server.service().server_name(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// One JSON-RPC message per request. Plain HTTP has no push channel, so
/// progress notifications are dropped.
pub async fn post_mcp(State(state): State<Arc<AppState>>, body: String) -> Response {
    match state.server.handle_message(&body, &Notifier::disabled()).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
