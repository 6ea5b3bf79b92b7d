use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::Deserialize;

use crate::api::ApiResponse;
use crate::errors::AppError;
use crate::models::sla::{EscalationRule, SlaDefinition, SlaStatusView};
use crate::sla::MAX_SLA_HOURS;
use crate::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
type StepPath = Result<Path<(String, u32)>, PathRejection>;

fn step_path(path: StepPath) -> Result<(String, u32), AppError> {
    let Path(params) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(params)
}

fn window_out_of_range(field: &str) -> AppError {
    AppError::BadRequest(format!("{} must not exceed {} hours", field, MAX_SLA_HOURS))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingRequest {
    pub approval_id: String,
    pub step_number: Option<u32>,
    pub sla_hours: Option<f64>,
    pub policy_id: Option<String>,
}

/// GET /workflow-analytics/sla/active
pub async fn list_active(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SlaStatusView>> {
    Ok(ApiResponse::data(state.sla.active()))
}

/// GET /workflow-analytics/sla/breached
pub async fn list_breached(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SlaStatusView>> {
    Ok(ApiResponse::data(state.sla.breached()))
}

/// GET /workflow-analytics/sla/warnings
pub async fn list_warnings(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SlaStatusView>> {
    Ok(ApiResponse::data(state.sla.warnings()))
}

/// GET /workflow-analytics/sla/policies
pub async fn list_policies(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SlaDefinition>> {
    Ok(ApiResponse::data(state.sla.policies()))
}

/// POST /workflow-analytics/sla/policies: insert or replace by id.
pub async fn define_policy(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SlaDefinition>, JsonRejection>,
) -> ApiResult<SlaDefinition> {
    let Json(definition) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if definition.id.trim().is_empty() {
        return Err(AppError::BadRequest("policy id must not be empty".into()));
    }
    if !definition.target_hours.is_finite() || definition.target_hours <= 0.0 {
        return Err(AppError::BadRequest("targetHours must be positive".into()));
    }
    if definition.target_hours > MAX_SLA_HOURS {
        return Err(window_out_of_range("targetHours"));
    }
    if !(0.0..=100.0).contains(&definition.warning_threshold_percent) {
        return Err(AppError::BadRequest(
            "warningThresholdPercent must be between 0 and 100".into(),
        ));
    }

    state.sla.define_policy(definition.clone());
    Ok(ApiResponse::data(definition))
}

/// POST /workflow-analytics/sla/track: by `policyId`, or by
/// `stepNumber` + `slaHours`.
pub async fn start_tracking(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StartTrackingRequest>, JsonRejection>,
) -> ApiResult<SlaStatusView> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if req.approval_id.trim().is_empty() {
        return Err(AppError::BadRequest("approvalId must not be empty".into()));
    }

    if let Some(policy_id) = req.policy_id {
        if state.sla.policy(&policy_id).is_none() {
            return Err(AppError::NotFound(format!("SLA policy '{}' not found", policy_id)));
        }
        return state
            .sla
            .start_tracking_for_policy(&req.approval_id, &policy_id)
            .map(ApiResponse::data)
            .ok_or_else(|| window_out_of_range("targetHours"));
    }

    let (Some(step_number), Some(sla_hours)) = (req.step_number, req.sla_hours) else {
        return Err(AppError::BadRequest(
            "either policyId or both stepNumber and slaHours are required".into(),
        ));
    };
    if !sla_hours.is_finite() || sla_hours < 0.0 {
        return Err(AppError::BadRequest("slaHours must not be negative".into()));
    }
    if sla_hours > MAX_SLA_HOURS {
        return Err(window_out_of_range("slaHours"));
    }

    state
        .sla
        .start_tracking(&req.approval_id, step_number, sla_hours)
        .map(ApiResponse::data)
        .ok_or_else(|| window_out_of_range("slaHours"))
}

/// GET /workflow-analytics/sla/tracking/:approval_id/:step
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    path: StepPath,
) -> ApiResult<SlaStatusView> {
    let (approval_id, step) = step_path(path)?;
    state
        .sla
        .status(&approval_id, step)
        .map(ApiResponse::data)
        .ok_or_else(|| AppError::NotFound("SLA tracking not found".into()))
}

/// DELETE /workflow-analytics/sla/tracking/:approval_id/:step
pub async fn stop_tracking(
    State(state): State<Arc<AppState>>,
    path: StepPath,
) -> ApiResult<()> {
    let (approval_id, step) = step_path(path)?;
    state.sla.stop_tracking(&approval_id, step);
    Ok(ApiResponse::message("SLA tracking stopped"))
}

/// GET /workflow-analytics/sla/tracking/:approval_id/:step/escalations
pub async fn check_escalation(
    State(state): State<Arc<AppState>>,
    path: StepPath,
) -> ApiResult<Vec<EscalationRule>> {
    let (approval_id, step) = step_path(path)?;
    Ok(ApiResponse::data(state.sla.check_escalation(&approval_id, step)))
}
