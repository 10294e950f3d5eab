//! REST API handlers for jobs, resources, and policies.
//!
//! Each handler delegates to a service and maps its error kind onto a
//! status code with [`status_for`](crate::status_for).

use std::fmt::Display;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use jobgrid_core::ErrorKind;
use jobgrid_state::Resource;

use crate::{ApiState, status_for};

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Map a service error onto its status code.
pub(crate) fn service_error(kind: ErrorKind, err: impl Display) -> Response {
    let status = status_for(kind);
    if kind == ErrorKind::Persistence {
        error!(error = %err, "request failed");
    }
    error_response(&err.to_string(), status)
}

/// The inbound `Authorization` header, forwarded as-is.
pub(crate) fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub(crate) fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body)
        .map_err(|e| error_response(&format!("invalid request body: {e}"), StatusCode::BAD_REQUEST))
}

// ── Health ─────────────────────────────────────────────────────

/// GET /jobmanager/healthz
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Jobs ───────────────────────────────────────────────────────

/// GET /jobmanager/jobs
pub async fn list_jobs(State(state): State<ApiState>) -> Response {
    match state.jobs.list_jobs() {
        Ok(jobs) => ApiResponse::ok(jobs).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// GET /jobmanager/jobs/{id}
pub async fn get_job(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.jobs.find_job(&id) {
        Ok(job) => ApiResponse::ok(job).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// DELETE /jobmanager/jobs/{id}
pub async fn delete_job(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.jobs.delete_job(&id) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// Claim request body.
#[derive(Deserialize)]
pub struct PromoteRequest {
    pub owner_id: String,
}

/// PUT /jobmanager/jobs/promote/{id}
pub async fn promote_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let req: PromoteRequest = match decode_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.jobs.promote_job(&id, &req.owner_id) {
        Ok(job) => ApiResponse::ok(job).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// Report request body.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ReportRequest {
    pub resource: Option<Resource>,
}

/// PUT /jobmanager/jobs/update/{id}
///
/// A finished reallocation teardown is redeployed before answering; if
/// that follow-up fails the report still stands.
pub async fn report_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req: ReportRequest = match decode_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let job = match state.jobs.report_job_state(&id, req.resource) {
        Ok(job) => job,
        Err(e) => return service_error(e.kind(), e),
    };
    match state.groups.after_report(&job, authorization(&headers)).await {
        Ok(Some(reallocated)) => ApiResponse::ok(reallocated).into_response(),
        Ok(None) => ApiResponse::ok(job).into_response(),
        Err(e) => {
            warn!(job_id = %id, error = %e, "reallocation after teardown failed");
            ApiResponse::ok(job).into_response()
        }
    }
}

/// GET /jobmanager/jobs/executable/orchestrator/{orchestrator}/owner/{owner}
pub async fn executable_jobs(
    State(state): State<ApiState>,
    Path((orchestrator, owner)): Path<(String, String)>,
) -> Response {
    match state.jobs.find_jobs_to_execute(&orchestrator, &owner) {
        Ok(jobs) => ApiResponse::ok(jobs).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

// ── Resources ──────────────────────────────────────────────────

/// GET /jobmanager/resources/status/{job_id}
pub async fn get_resource_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Response {
    match state.resources.find_resource_by_job(&job_id) {
        Ok(resource) => ApiResponse::ok(resource).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// PUT /jobmanager/resources/status/{job_id}
pub async fn update_resource_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Response {
    let resource: Resource = match decode_json(&body) {
        Ok(resource) => resource,
        Err(resp) => return resp,
    };
    match state.resources.update_resource_state(&job_id, resource) {
        Ok(resource) => ApiResponse::ok(resource).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

// ── Policies ───────────────────────────────────────────────────

/// POST /jobmanager/policies/incompliance/create
pub async fn policy_incompliance(State(state): State<ApiState>, body: Bytes) -> Response {
    match state.policies.handle_policy_incompliance(&body) {
        Ok(remediation) => ApiResponse::ok(remediation).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

/// GET /jobmanager/policies/remediations/{resource_id}
pub async fn list_remediations(
    State(state): State<ApiState>,
    Path(resource_id): Path<String>,
) -> Response {
    match state.policies.list_remediations(&resource_id) {
        Ok(remediations) => ApiResponse::ok(remediations).into_response(),
        Err(e) => service_error(e.kind(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use jobgrid_allocator::{
        AllocationRequest, Allocator, AllocatorError, AllocatorResult, MatchmakingClient,
    };
    use jobgrid_orchestrator::JobGroupService;
    use jobgrid_policy::{Notification, PolicyManagerClient, PolicyResult, PolicyService};
    use jobgrid_scheduler::{JobService, LeaseConfig, ResourceService};
    use jobgrid_state::{Instruction, Job, JobGroup, JobGroupRepository, JobState, StateStore};
    use tracing::Span;

    struct Offline;

    #[async_trait]
    impl MatchmakingClient for Offline {
        async fn matchmake(&self, _: AllocationRequest) -> AllocatorResult<Vec<u8>> {
            Err(AllocatorError::Matchmaking {
                status: 503,
                body: "offline".to_string(),
            })
        }
    }

    #[async_trait]
    impl PolicyManagerClient for Offline {
        async fn notify(&self, _: &Notification, _: Option<&str>) -> PolicyResult<()> {
            Ok(())
        }
    }

    fn test_state() -> (StateStore, ApiState) {
        let store = StateStore::open_in_memory().unwrap();
        let jobs = Arc::new(JobService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            LeaseConfig::default(),
            Span::none(),
        ));
        let state = ApiState {
            resources: Arc::new(ResourceService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Span::none(),
            )),
            groups: Arc::new(JobGroupService::new(
                Arc::new(store.clone()),
                jobs.clone(),
                Allocator::new(Arc::new(Offline)),
                Arc::new(Offline),
                Span::none(),
            )),
            policies: Arc::new(PolicyService::new(
                jobs.clone(),
                Arc::new(store.clone()),
                Span::none(),
            )),
            jobs,
        };
        (store, state)
    }

    fn seed_job(store: &StateStore) -> Job {
        let mut group = JobGroup::new("shop", "");
        group.push_job(Job::new("", "shop", Instruction::default()));
        store.save_job_group(&group).unwrap();
        group.jobs.remove(0)
    }

    #[tokio::test]
    async fn list_jobs_empty() {
        let (_, state) = test_state();
        let resp = list_jobs(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_nonexistent_job() {
        let (_, state) = test_state();
        let resp = get_job(State(state), Path("nope".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn promote_then_promote_again_conflicts() {
        let (store, state) = test_state();
        let job = seed_job(&store);
        let body = Bytes::from_static(br#"{"owner_id":"driver-a"}"#);

        let resp = promote_job(State(state.clone()), Path(job.id.clone()), body.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = promote_job(State(state), Path(job.id.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn promote_with_bad_body_is_bad_request() {
        let (store, state) = test_state();
        let job = seed_job(&store);
        let resp = promote_job(State(state), Path(job.id), Bytes::from_static(b"{}")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_on_unclaimed_job_conflicts_and_degrades() {
        let (store, state) = test_state();
        let job = seed_job(&store);
        let resp = report_job(
            State(state.clone()),
            Path(job.id.clone()),
            HeaderMap::new(),
            Bytes::from_static(br#"{"resource":{"resource_name":"web"}}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.jobs.find_job(&job.id).unwrap().state, JobState::Degraded);
    }

    #[tokio::test]
    async fn lease_query_rejects_unknown_orchestrator() {
        let (_, state) = test_state();
        let resp = executable_jobs(
            State(state),
            Path(("kubernetes".to_string(), "driver-a".to_string())),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn incompliance_for_unknown_resource_is_not_found() {
        let (_, state) = test_state();
        let resp = policy_incompliance(
            State(state),
            Bytes::from_static(br#"{"remediation":"patch","subject":{"resourceId":"nope"}}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn authorization_header_is_forwarded_verbatim() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(authorization(&headers), Some("Bearer abc"));
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::External), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Persistence), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
