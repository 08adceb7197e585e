use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use genmedia_core::TransportMode;
use genmedia_mcp::McpServer;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

mod handlers;
pub mod sse;

use sse::SessionRegistry;

/// State shared by every request handler.
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}

/// Serve the HTTP or SSE transport on `addr` until Ctrl-C.
pub async fn serve(addr: &str, server: Arc<McpServer>, mode: TransportMode) -> Result<()> {
    let app = create_router(AppState::new(server), mode);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(transport = %mode, "listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Routes for one network transport. Both carry `/health`.
pub fn create_router(state: AppState, mode: TransportMode) -> Router {
    let router = Router::new().route("/health", get(handlers::health_check));
    let router = match mode {
        TransportMode::Sse => router
            .route("/sse", get(sse::connect))
            .route("/message", post(sse::post_message)),
        _ => router.route("/mcp", post(handlers::post_mcp)),
    };
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .with_state(Arc::new(state))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
