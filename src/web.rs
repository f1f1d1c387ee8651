use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::TourGuideError;
use crate::api::{self, AppState};
use crate::config::ServerConfig;

/// Build the full application: `/api` routes, optional static files, CORS
pub fn app(config: &ServerConfig, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Location wait plus fetch wait, with a little slack for the response.
    let request_timeout =
        state.limits.location_timeout + state.limits.fetch_timeout + Duration::from_secs(5);

    let mut app = Router::new().nest("/api", api::router(state));
    if let Some(static_dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ))
    .layer(cors)
}

pub async fn run(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = app(config, state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TourGuideError::server(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Web server running at http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server stopped unexpectedly")?;

    tracing::info!("Web server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
