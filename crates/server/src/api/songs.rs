//! Song lookup endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tunefetch_core::{OrchestratorError, Song, StructuredQuery};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    pub url: String,
}

/// GET /song/search - Best match for a free-text query.
pub async fn search_song(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Song>, ApiError> {
    let songs = state.orchestrator().search(&params.query).await?;
    songs
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| OrchestratorError::NoMatchFound(params.query).into())
}

/// GET /song/url - Song behind a provider track URL.
pub async fn song_from_url(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Result<Json<Song>, ApiError> {
    let item = state.orchestrator().resolve_by_url(&params.url).await?;
    Ok(Json(Song::clone(&item.song)))
}

/// GET /songs/search - All matches for a free-text query.
pub async fn search_songs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let songs = state.orchestrator().search(&params.query).await?;
    Ok(Json(songs))
}

/// POST /songs/search - Field-based search.
pub async fn search_songs_structured(
    State(state): State<Arc<AppState>>,
    Json(query): Json<StructuredQuery>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let songs = state.orchestrator().search_structured(&query).await?;
    Ok(Json(songs))
}
