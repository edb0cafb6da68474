//! Runtime settings API handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use atus_core::AllocationPolicy;

use super::error::ApiError;
use crate::state::AppState;

/// Allocation policy request/response body
#[derive(Debug, Serialize, Deserialize)]
pub struct AllocationPolicyBody {
    pub policy: AllocationPolicy,
}

pub async fn get_allocation_policy(State(state): State<Arc<AppState>>) -> Json<AllocationPolicyBody> {
    Json(AllocationPolicyBody {
        policy: state.orchestrator().allocation_policy(),
    })
}

/// Persist a new policy. The next allocation already uses it.
pub async fn set_allocation_policy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AllocationPolicyBody>,
) -> Result<Json<AllocationPolicyBody>, ApiError> {
    state.orchestrator().set_allocation_policy(body.policy)?;
    Ok(Json(body))
}
