//! Runtime settings endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tunefetch_core::{SanitizedSettings, SettingsPatch};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OutputRequest {
    pub output: PathBuf,
}

/// GET /settings - Active settings, credentials redacted.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SanitizedSettings> {
    let settings = state.orchestrator().settings().await;
    Json(SanitizedSettings::from(settings.as_ref()))
}

/// POST /settings - Apply a partial settings change.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SanitizedSettings>, ApiError> {
    let installed = state.orchestrator().change_settings(patch).await?;
    info!(version = installed.version, "Settings updated");
    Ok(Json(SanitizedSettings::from(installed.as_ref())))
}

/// POST /settings/output - Change the output directory.
pub async fn update_output(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OutputRequest>,
) -> Result<Json<SanitizedSettings>, ApiError> {
    let installed = state.orchestrator().change_output(request.output).await?;
    info!(
        version = installed.version,
        output = %installed.output.display(),
        "Output directory changed"
    );
    Ok(Json(SanitizedSettings::from(installed.as_ref())))
}
