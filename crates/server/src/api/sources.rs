//! Discovery source API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use atus_core::intake::{SourceRecord, SourceSeed};

use super::error::ApiError;
use crate::state::AppState;

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SourceRecord>>, ApiError> {
    Ok(Json(state.orchestrator().sources()?))
}

pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(seed): Json<SourceSeed>,
) -> Result<(StatusCode, Json<SourceRecord>), ApiError> {
    let source = state.orchestrator().add_source(seed)?;
    Ok((StatusCode::CREATED, Json(source)))
}

pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator().delete_source(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SourceRecord>, ApiError> {
    Ok(Json(state.orchestrator().enable_source(&id)?))
}

pub async fn disable_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SourceRecord>, ApiError> {
    Ok(Json(state.orchestrator().disable_source(&id)?))
}
