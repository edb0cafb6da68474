//! Agent API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use atus_core::{
    agent::{Agent, AgentSnapshot},
    orchestrator::AgentUpdate,
    AgentSeed,
};

use super::error::ApiError;
use crate::state::AppState;

/// Every registered agent with its last statistics.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentSnapshot>> {
    Json(state.orchestrator().agents().await)
}

/// Register an agent. Unset intervals fall back to `[agent_defaults]`.
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(seed): Json<AgentSeed>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let agent = state.orchestrator().add_agent(seed).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<AgentUpdate>,
) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.orchestrator().update_agent(&id, update).await?))
}

pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator().delete_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.orchestrator().enable_agent(&id).await?))
}

/// Stop polling an agent. Releases assigned to it keep their assignment.
pub async fn disable_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.orchestrator().disable_agent(&id).await?))
}
