//! Router construction and server startup for the A1 HTTP control
//! surface: a CORS/trace-layer wrapped axum router.

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // --- CLI envelope ---
        .route("/api/cli", post(handlers::handle_cli))
        // --- Read-only introspection ---
        .route("/api/targets", get(handlers::list_targets))
        .route(
            "/api/targets/{account}/{region}/{service}/decisions",
            get(handlers::target_decisions),
        )
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_web_server(bind_addr: &str, state: AppState) -> Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("HTTP control surface listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
