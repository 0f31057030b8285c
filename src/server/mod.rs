//! HTTP surface: image upload (publish side) and variant retrieval.

mod error;
mod routes;

pub use error::AppError;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broker::ImagePublisher;
use crate::config::ServerConfig;
use crate::store::FileStore;

/// Shared application context handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    /// Store the retrieval endpoint reads from.
    pub store: Arc<FileStore>,
    /// Publish side of the broker the upload endpoint hands images to.
    pub publisher: Arc<dyn ImagePublisher>,
}

/// Create the Axum router with all routes.
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/images", post(routes::upload_image))
        .route("/api/images/:id", get(routes::get_image))
        .route("/api/status", get(routes::status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    config: &ServerConfig,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    Ok(())
}
