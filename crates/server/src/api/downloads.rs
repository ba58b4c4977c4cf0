//! Download endpoints.
//!
//! Both download routes block until the item finished. With
//! `return_file=true` the response body is the produced audio file.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;
use tunefetch_core::{DownloadOutcome, OrchestratorStatus, WorkItem};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadSearchParams {
    pub query: String,
    #[serde(default)]
    pub return_file: bool,
}

#[derive(Debug, Deserialize)]
pub struct DownloadObjectParams {
    #[serde(default)]
    pub return_file: bool,
}

/// POST /download/search - Download the best match for a query.
pub async fn download_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadSearchParams>,
) -> Result<Response, ApiError> {
    let item = state.orchestrator().resolve_by_query(&params.query).await?;
    download(&state, item, params.return_file).await
}

/// POST /download/objects - Download a client-supplied song object.
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadObjectParams>,
    Json(raw): Json<Value>,
) -> Result<Response, ApiError> {
    let item = state.orchestrator().resolve_by_object(raw)?;
    download(&state, item, params.return_file).await
}

/// GET /download/status - Pool and settings status.
pub async fn download_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status().await)
}

async fn download(
    state: &AppState,
    item: WorkItem,
    return_file: bool,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator().run(item, return_file).await?;
    info!(
        request_id = %outcome.request_id,
        song = %outcome.song.display_name(),
        elapsed_ms = outcome.elapsed_ms,
        "Download finished"
    );

    match (&outcome.path, return_file) {
        (Some(path), true) => Ok(serve_file(path).await),
        _ => Ok(Json::<DownloadOutcome>(outcome).into_response()),
    }
}

async fn serve_file(path: &Path) -> Response {
    let mut response = match ServeFile::new(path).oneshot(Request::new(Body::empty())).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    let disposition = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| format!("attachment; filename=\"{}\"", name.replace('"', "")))
        .and_then(|value| HeaderValue::from_str(&value).ok());
    if let Some(value) = disposition {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
