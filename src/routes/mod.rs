// ============================================================================
// Axum Routes Module
// ============================================================================
//
// The transport boundary: inbound HTTP requests are converted into
// RelayService calls, and RelayService results (and error kinds) into
// responses. No relay logic lives here.
//
// Structure:
// - mod.rs: router assembly and middleware
// - messages.rs: publish/consume endpoints
// - health.rs: health check and metrics endpoints
//
// ============================================================================

mod health;
mod messages;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::MAX_REQUEST_BODY_SIZE;
use crate::context::AppContext;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Relay endpoints
        .route(
            "/messages",
            post(messages::publish_message).get(messages::consume_message),
        )
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
                .into_inner(),
        )
        .with_state(app_context)
}
