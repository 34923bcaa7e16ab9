use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{artifacts, handlers, jobs, middleware::metrics_middleware, upload};
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_bytes = usize::try_from(state.config().upload.max_bytes).unwrap_or(usize::MAX);
    let body_limit = max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Jobs
        .route(
            "/upload",
            post(upload::upload_video).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/status/{job_id}", get(jobs::get_status))
        // Artifacts
        .route("/video/{job_id}/manifest.mpd", get(artifacts::serve_manifest))
        .route("/video/{job_id}/{segment}", get(artifacts::serve_segment))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
