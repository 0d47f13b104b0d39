use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, media, middleware::metrics_middleware, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/state", get(handlers::get_state))
        // Current file
        .route(
            "/file",
            post(media::upload_file).delete(media::clear_file),
        )
        .route("/file/metadata", post(media::attach_metadata))
        .route("/file/playback-error", post(media::report_playback_error))
        .route("/download", get(media::download))
        .route("/preview/{id}", get(media::preview))
        // Conversion
        .route("/convert", post(media::convert))
        .route("/error/dismiss", post(media::dismiss_error))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
