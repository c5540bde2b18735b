pub mod auth;
pub mod dispatch;
pub mod handler;
pub mod streaming;

use arc_swap::ArcSwap;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use genrelay_core::config::Config;
use genrelay_core::metrics::Metrics;
use genrelay_core::store::ConfigStore;
use genrelay_provider::UpstreamClient;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler. Cloning it only clones `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub store: Arc<dyn ConfigStore>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub metrics: Arc<Metrics>,
    pub http_client: reqwest::Client,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.load().body_limit_mb * 1024 * 1024;

    Router::new()
        .route("/api/v1/chat/completions", post(handler::chat::chat_completions))
        .route("/api/v1/embeddings", post(handler::embeddings::embeddings))
        .route("/api/v1/images/generations", post(handler::images::generate_image))
        .route("/api/v1/models", get(handler::models::list_models_alt))
        .route("/api/v1beta/models", get(handler::native::list_models_native))
        .route("/api/v1beta/models/{*rest}", get(handler::native::native_action).post(handler::native::native_action))
        .route("/api/tunedModels/{*rest}", get(handler::native::native_action).post(handler::native::native_action))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_snapshot))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_snapshot(state: axum::extract::State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(state.metrics.snapshot())
}
