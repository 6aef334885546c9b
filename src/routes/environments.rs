//! Environment listing for the request form

use crate::environments::EnvironmentSummary;
use crate::error::AppError;
use crate::models::SuccessResponse;
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EnvironmentList {
    pub environments: Vec<EnvironmentSummary>,
}

/// GET /api/environments
pub async fn list_environments(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<EnvironmentList>>, AppError> {
    let environments = state.engine.list_environments().await?;

    Ok(Json(SuccessResponse::with_data(
        format!("{} environments available", environments.len()),
        EnvironmentList { environments },
    )))
}
