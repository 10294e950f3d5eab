//! REST API handlers for job groups.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::ApiState;
use crate::handlers::{ApiResponse, authorization, service_error};

/// GET /jobmanager/jobgroups
pub async fn list_job_groups(State(state): State<ApiState>) -> Response {
    match state.groups.list_job_groups() {
        Ok(groups) => ApiResponse::ok(groups).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// GET /jobmanager/jobgroups/{id}
pub async fn get_job_group(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.groups.find_job_group(&id) {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// POST /jobmanager/jobgroups
///
/// The body is the raw multi-document YAML descriptor.
pub async fn create_job_group(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state
        .groups
        .create_job_group(&body, authorization(&headers))
        .await
    {
        Ok(group) => (StatusCode::CREATED, ApiResponse::ok(group)).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// PUT /jobmanager/jobgroups
pub async fn replace_job_group(State(state): State<ApiState>, body: Bytes) -> Response {
    match state.groups.replace_job_group(&body) {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// PUT /jobmanager/jobgroups/start/{id}
pub async fn start_job_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state
        .groups
        .start_job_group(&id, authorization(&headers))
        .await
    {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// PUT /jobmanager/jobgroups/undeploy/{id}
pub async fn stop_job_group(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.groups.stop_job_group(&id) {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// DELETE /jobmanager/jobgroups/{id}
pub async fn delete_job_group(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.groups.delete_job_group(&id) {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// PUT /jobmanager/jobgroups/reallocate/{job_id}
pub async fn reallocate_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state
        .groups
        .reallocate_job(&job_id, authorization(&headers))
        .await
    {
        Ok(job) => ApiResponse::ok(job).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}
