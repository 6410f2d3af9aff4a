//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::scheduler::PartSwapScheduler;
use crate::status::RuntimeStore;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub graph: Arc<Graph>,
    pub store: Arc<RuntimeStore>,
    pub scheduler: Arc<PartSwapScheduler>,
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Style profiles
        .route("/profiles", get(super::handlers::list_profiles))

        // Graph nodes
        .route("/nodes", get(super::handlers::list_nodes))
        .route("/nodes/thought", post(super::handlers::create_thought_node))
        .route("/nodes/gate", post(super::handlers::create_gate_node))
        .route(
            "/nodes/:node_id",
            get(super::handlers::get_node).patch(super::handlers::update_node),
        )
        .route(
            "/nodes/:node_id/inputs/:slot",
            put(super::handlers::connect_input).delete(super::handlers::disconnect_input),
        )

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the control surface until `shutdown` resolves
pub async fn run(
    ctx: AppContext,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
