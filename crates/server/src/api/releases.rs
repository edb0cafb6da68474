//! Release API handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use atus_core::{Release, ReleaseState};

use super::error::ApiError;
use crate::state::AppState;

/// Query parameters for listing releases
#[derive(Debug, Deserialize)]
pub struct ListReleasesParams {
    /// Only releases in this state (e.g. `DOWNLOADING`)
    pub state: Option<ReleaseState>,
}

/// List live releases, oldest first.
pub async fn list_releases(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListReleasesParams>,
) -> Json<Vec<Release>> {
    let mut releases = state.orchestrator().releases().await;
    if let Some(wanted) = params.state {
        releases.retain(|r| r.state == wanted);
    }
    releases.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));
    Json(releases)
}

pub async fn get_release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Release>, ApiError> {
    Ok(Json(state.orchestrator().release(&id).await?))
}

/// Delete a release, its meta files and its artifacts.
pub async fn delete_release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Release>, ApiError> {
    Ok(Json(state.orchestrator().delete_release(&id).await?))
}

/// Retry the upload of a DOWNLOADED or UPLOAD_ERROR release.
pub async fn retry_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Release>, ApiError> {
    Ok(Json(state.orchestrator().retry_upload(&id).await?))
}
