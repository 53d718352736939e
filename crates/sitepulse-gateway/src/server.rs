//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use sitepulse_agent::ConversationRouter;
use sitepulse_channels::ChannelDeliveryQueue;
use sitepulse_core::config::GatewayConfig;
use sitepulse_scheduler::ScanScheduler;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub gateway_config: GatewayConfig,
    pub start_time: std::time::Instant,
    /// Channel registrations go straight to the delivery queue.
    pub queue: Arc<ChannelDeliveryQueue>,
    pub scheduler: Arc<ScanScheduler>,
    pub router: Arc<ConversationRouter>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/message", post(super::routes::post_message))
        .route("/api/v1/channels", post(super::routes::register_channel))
        .route(
            "/api/v1/schedules/{user_id}",
            get(super::routes::list_schedules).delete(super::routes::cancel_schedules),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Bind and serve until the process stops.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.gateway_config.host, state.gateway_config.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
