use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{downloads, handlers, middleware::metrics_middleware, settings, songs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Song lookup
        .route("/song/search", get(songs::search_song))
        .route("/song/url", get(songs::song_from_url))
        .route(
            "/songs/search",
            get(songs::search_songs).post(songs::search_songs_structured),
        )
        // Downloads
        .route("/download/search", post(downloads::download_search))
        .route("/download/objects", post(downloads::download_object))
        .route("/download/status", get(downloads::download_status))
        // Runtime settings
        .route(
            "/settings",
            get(settings::get_settings).post(settings::update_settings),
        )
        .route("/settings/output", post(settings::update_output));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
