//! DML request route handlers
//!
//! Thin adapters over the workflow engine; the caller's [`Session`] comes from
//! the auth middleware.

use crate::auth::{Role, Session};
use crate::error::{validation_error, AppError};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use crate::store::RequestFilter;
use crate::workflow::{DmlRequest, ExecutionReport, NewDmlRequest, RequestStatus};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing query; exactly one key selects the filter
#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
    pub requestor: Option<String>,
    pub manager: Option<String>,
    pub support: Option<String>,
    /// Requests the caller submitted or decided, depending on their role
    #[serde(default)]
    pub mine: bool,
}

impl ListRequestsQuery {
    fn into_filter(self, session: &Session) -> Result<RequestFilter, AppError> {
        let mut filters = Vec::new();

        if let Some(status) = self.status {
            let status = status
                .parse::<RequestStatus>()
                .map_err(|e| validation_error(e.to_string()))?;
            filters.push(RequestFilter::Status(status));
        }
        if let Some(user) = self.requestor {
            filters.push(RequestFilter::Requestor(user));
        }
        if let Some(user) = self.manager {
            filters.push(RequestFilter::Manager(user));
        }
        if let Some(user) = self.support {
            filters.push(RequestFilter::Support(user));
        }
        if self.mine {
            let user = session.username.clone();
            filters.push(match session.role {
                Role::Requestor => RequestFilter::Requestor(user),
                Role::Manager => RequestFilter::Manager(user),
                Role::Support => RequestFilter::Support(user),
            });
        }

        match filters.len() {
            1 => Ok(filters.remove(0)),
            0 => Err(validation_error(
                "One of status, requestor, manager, support or mine is required",
            )),
            _ => Err(validation_error("Only one listing filter may be given")),
        }
    }
}

/// Body of a manager or support decision
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedRequest {
    pub request_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RequestList {
    pub requests: Vec<DmlRequest>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub execution: ExecutionReport,
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request: DmlRequest,
}

/// POST /api/requests
pub async fn submit_request(
    State(state): State<SharedState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<NewDmlRequest>,
) -> Result<(StatusCode, Json<SuccessResponse<SubmittedRequest>>), AppError> {
    let request_id = state.engine.submit_request(&session, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Request submitted for manager approval",
            SubmittedRequest { request_id },
        )),
    ))
}

/// GET /api/requests
pub async fn list_requests(
    State(state): State<SharedState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<SuccessResponse<RequestList>>, AppError> {
    let filter = query.into_filter(&session)?;
    let requests = state.engine.list_requests(&filter).await?;
    let count = requests.len();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} requests", count),
        RequestList { requests, count },
    )))
}

/// GET /api/requests/{id}
pub async fn get_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<RequestDetail>>, AppError> {
    let request = state.engine.get_request(id).await?;

    Ok(Json(SuccessResponse::with_data(
        "Request retrieved",
        RequestDetail { request },
    )))
}

/// POST /api/requests/{id}/manager-decision
pub async fn manager_decision(
    State(state): State<SharedState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(decision): Json<DecisionRequest>,
) -> Result<Json<SuccessResponse<RequestDetail>>, AppError> {
    let request = state
        .engine
        .manager_decide(&session, id, decision.approve, decision.comments)
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Request is now '{}'", request.status),
        RequestDetail { request },
    )))
}

/// POST /api/requests/{id}/support-decision
pub async fn support_decision(
    State(state): State<SharedState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(decision): Json<DecisionRequest>,
) -> Result<Json<SuccessResponse<RequestDetail>>, AppError> {
    let request = state
        .engine
        .support_decide(&session, id, decision.approve, decision.comments)
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Request is now '{}'", request.status),
        RequestDetail { request },
    )))
}

/// POST /api/requests/{id}/execute
///
/// A failed statement is still a 200: the attempt happened and was recorded.
pub async fn execute_request(
    State(state): State<SharedState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<ExecutionResult>>, AppError> {
    let execution = state.engine.execute_request(&session, id).await?;

    let message = if execution.success {
        "Request executed".to_string()
    } else {
        format!("Execution failed: {}", execution.message)
    };
    Ok(Json(SuccessResponse::with_data(message, ExecutionResult { execution })))
}
