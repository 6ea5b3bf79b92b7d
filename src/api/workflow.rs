use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;

use crate::api::ApiResponse;
use crate::errors::AppError;
use crate::models::workflow::{
    MetricsFilter, StepDecision, StepPlan, WorkflowMetrics, WorkflowPerformance,
};
use crate::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub workflow_id: String,
    pub workflow_type: String,
    #[serde(default)]
    pub steps: Vec<StepPlan>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteStepRequest {
    pub decision: StepDecision,
}

fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    let Path(params) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(params)
}

fn workflow_not_found() -> AppError {
    AppError::NotFound("Workflow not found".into())
}

/// GET /workflow-analytics/metrics?workflowType=&startDate=&endDate=
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MetricsFilter>, QueryRejection>,
) -> ApiResult<WorkflowMetrics> {
    let Query(filter) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(ApiResponse::data(state.analytics.metrics(&filter)))
}

/// GET /workflow-analytics/workflow/:id
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<WorkflowPerformance> {
    let id = path_params(path)?;
    state
        .analytics
        .workflow_performance(&id)
        .map(ApiResponse::data)
        .ok_or_else(workflow_not_found)
}

/// POST /workflow-analytics/workflow
pub async fn start_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> ApiResult<WorkflowPerformance> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if req.workflow_id.trim().is_empty() || req.workflow_type.trim().is_empty() {
        return Err(AppError::BadRequest(
            "workflowId and workflowType must not be empty".into(),
        ));
    }
    if let Some(bad) = req
        .steps
        .iter()
        .find(|s| !s.sla_target.is_finite() || s.sla_target < 0.0)
    {
        return Err(AppError::BadRequest(format!(
            "step {} has an invalid slaTarget",
            bad.step_number
        )));
    }

    state
        .analytics
        .track_workflow_start(&req.workflow_id, &req.workflow_type, &req.steps);
    state
        .analytics
        .workflow_performance(&req.workflow_id)
        .map(ApiResponse::data)
        .ok_or_else(workflow_not_found)
}

/// POST /workflow-analytics/workflow/:id/steps/:step/complete
pub async fn complete_step(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    body: Result<Json<CompleteStepRequest>, JsonRejection>,
) -> ApiResult<WorkflowPerformance> {
    let (id, step) = path_params(path)?;
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    state.analytics.track_step_completion(&id, step, req.decision);
    state
        .analytics
        .workflow_performance(&id)
        .map(ApiResponse::data)
        .ok_or_else(workflow_not_found)
}

/// POST /workflow-analytics/workflow/:id/complete
pub async fn complete_workflow(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<WorkflowPerformance> {
    let id = path_params(path)?;
    state.analytics.track_workflow_completion(&id);
    state
        .analytics
        .workflow_performance(&id)
        .map(ApiResponse::data)
        .ok_or_else(workflow_not_found)
}

/// POST /workflow-analytics/cleanup: purge records past retention.
/// Always reports success.
pub async fn cleanup(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    let days = state.config.retention_days;
    let removed = state.analytics.clear_old_data(days);
    Ok(ApiResponse::message(format!(
        "Cleared {} workflow records older than {} days",
        removed, days
    )))
}
