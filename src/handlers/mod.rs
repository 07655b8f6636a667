pub mod artifacts;
pub mod encode;
pub mod form;
pub mod health;

pub use artifacts::*;
pub use encode::*;
pub use form::*;
pub use health::*;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::middleware::{auth_middleware, logging_middleware, rate_limit_middleware};
use crate::services::EncodingService;

// Multipart framing on top of the document itself
const BODY_LIMIT_SLACK_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EncodingService>,
}

impl AppState {
    pub fn new(service: EncodingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Builds the full application router.
pub fn create_router(state: AppState, config: &Config) -> Router {
    Router::new()
        // Browser flow: form, redirecting upload, download
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/download/:filename", get(download_handler))
        // JSON API
        .route("/api/v1/encode", post(encode_handler))
        .route("/api/v1/encode/binary", post(encode_binary_handler))
        .route("/api/v1/artifacts/:name", get(artifact_handler))
        // Probes
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(config.max_file_size_bytes() + BODY_LIMIT_SLACK_BYTES))
                .layer(axum::middleware::from_fn(auth_middleware))
                .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware)),
        )
        .with_state(state)
}
