use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_types::{EventRecord, HealthStatus, VigilError};

use super::responses::*;
use crate::storage::{DependencyCheck, EvidenceRecord, SupervisorStorage};
use crate::supervisor::{SupervisorHandle, SupervisorPhase};

#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<SupervisorStorage>,
    pub supervisor: SupervisorHandle,
}

pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

impl ApiError {
    fn internal(error: VigilError) -> Self {
        warn!("API request failed: {}", error);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiErrorResponse::with_details("internal_error", "Request failed", &error.to_string()),
        }
    }

    fn unavailable(error: VigilError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ApiErrorResponse::with_details(
                "supervisor_unavailable",
                "Supervisor is not accepting commands",
                &error.to_string(),
            ),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorResponse::new("bad_request", message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.body))).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub async fn status(State(state): State<ApiState>) -> ApiResult<StatusResponse> {
    ok(StatusResponse {
        api_version: API_VERSION.to_string(),
        supervisor: state.supervisor.status(),
        storage: state.storage.storage_metrics().snapshot(),
    })
}

pub async fn health(State(state): State<ApiState>) -> ApiResult<HealthResponse> {
    let report = state.supervisor.status();
    let last_status = report.last_health.as_ref().map(|h| h.status);

    let healthy = report.phase == SupervisorPhase::Running
        && report.worker_active
        && last_status != Some(HealthStatus::Critical);

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        code,
        Json(ApiResponse::success(HealthResponse {
            healthy,
            phase: report.phase.to_string(),
            status: last_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            worker_active: report.worker_active,
            restarts_performed: report.restarts_performed,
            budget_remaining: report.budget_remaining(),
            uptime_secs: report.uptime_secs,
        })),
    ))
}

pub async fn events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<EventRecord>> {
    let events = state
        .storage
        .recent_events(query.effective_limit())
        .map_err(ApiError::internal)?;
    ok(events)
}

pub async fn record_evidence(
    State(state): State<ApiState>,
    Json(record): Json<EvidenceRecord>,
) -> ApiResult<AcceptedResponse> {
    if record.kind.trim().is_empty() {
        return Err(ApiError::bad_request("Evidence kind must not be empty"));
    }

    state
        .storage
        .record_evidence(&record)
        .map_err(ApiError::internal)?;
    debug!("Accepted evidence '{}'", record.kind);

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(AcceptedResponse {
            accepted: record.kind,
        })),
    ))
}

pub async fn record_dependency(
    State(state): State<ApiState>,
    Json(check): Json<DependencyCheck>,
) -> ApiResult<AcceptedResponse> {
    if check.name.trim().is_empty() {
        return Err(ApiError::bad_request("Dependency name must not be empty"));
    }

    state
        .storage
        .record_dependency_check(&check)
        .map_err(ApiError::internal)?;
    debug!("Accepted dependency check '{}' (success={})", check.name, check.success);

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(AcceptedResponse {
            accepted: check.name,
        })),
    ))
}

pub async fn reset_restarts(State(state): State<ApiState>) -> ApiResult<ResetResponse> {
    let cleared = state
        .supervisor
        .reset_restart_budget()
        .await
        .map_err(ApiError::unavailable)?;
    ok(ResetResponse { cleared })
}

pub async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: ApiErrorResponse::new("not_found", "No such endpoint"),
    }
}
