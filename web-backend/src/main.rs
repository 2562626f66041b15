mod handlers;
mod state;

use anyhow::Context;
use axum::{http::Method, routing::get, Router};
use state::AppState;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeFile,
    trace::TraceLayer,
};
use tracing::{info, warn, Level};
use tubedrop_core::{check_ffmpeg, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = ServerConfig::load().context("Failed to load configuration")?;
    check_transcoder(&config).await?;

    let addr = config.socket_addr();
    let state = AppState::new(config).await?;
    let app = build_router(state);

    info!("Tubedrop listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// ffmpeg is only needed for mp3 requests, so by default a missing binary is just a warning
async fn check_transcoder(config: &ServerConfig) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg(&config.ffmpeg_path).await;

    if ffmpeg.available {
        info!(
            "FFmpeg found ({})",
            ffmpeg.version.as_deref().unwrap_or("unknown version")
        );
        return Ok(());
    }

    let detail = ffmpeg.detail.unwrap_or_default();
    if config.require_ffmpeg {
        anyhow::bail!("FFmpeg is required but unavailable: {}", detail);
    }

    warn!("FFmpeg may not be installed, mp3 conversion will fail: {}", detail);
    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(300));

    let index = ServeFile::new(state.config.static_dir.join("index.html"));
    let body_limit = state.config.max_content_length;

    Router::new()
        .route_service("/", index)
        .route("/download", get(handlers::download))
        .route("/health", get(handlers::health_check))
        .route("/api/dependencies", get(handlers::dependency_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(cors),
        )
        .with_state(state)
}
