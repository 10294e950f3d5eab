//! jobgrid-api — REST API for the job manager.
//!
//! Every route lives under `/jobmanager` and answers with
//! `{success, data?, error?}`. The inbound `Authorization` header is
//! forwarded unchanged to the matchmaker and the policy manager.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/jobmanager/healthz` | Liveness |
//! | GET | `/jobmanager/jobs` | List jobs |
//! | GET | `/jobmanager/jobs/{id}` | Get a job |
//! | DELETE | `/jobmanager/jobs/{id}` | Delete an undeployed job |
//! | PUT | `/jobmanager/jobs/promote/{id}` | Claim a job |
//! | PUT | `/jobmanager/jobs/update/{id}` | Report a job's outcome |
//! | GET | `/jobmanager/jobs/executable/orchestrator/{o}/owner/{owner}` | Lease query |
//! | POST | `/jobmanager/jobgroups` | Create from a YAML descriptor |
//! | GET | `/jobmanager/jobgroups` | List job groups |
//! | PUT | `/jobmanager/jobgroups` | Replace a job group |
//! | GET | `/jobmanager/jobgroups/{id}` | Get a job group |
//! | DELETE | `/jobmanager/jobgroups/{id}` | Delete a job group |
//! | PUT | `/jobmanager/jobgroups/start/{id}` | Start (re-allocate) |
//! | PUT | `/jobmanager/jobgroups/undeploy/{id}` | Stop (undeploy) |
//! | PUT | `/jobmanager/jobgroups/reallocate/{job_id}` | Reallocate one job |
//! | GET | `/jobmanager/resources/status/{job_id}` | Resource of a job |
//! | PUT | `/jobmanager/resources/status/{job_id}` | Push resource state |
//! | POST | `/jobmanager/policies/incompliance/create` | Incompliance callback |
//! | GET | `/jobmanager/policies/remediations/{resource_id}` | Remediation history |

pub mod group_handlers;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put};

use jobgrid_core::ErrorKind;
use jobgrid_orchestrator::JobGroupService;
use jobgrid_policy::PolicyService;
use jobgrid_scheduler::{JobService, ResourceService};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub jobs: Arc<JobService>,
    pub resources: Arc<ResourceService>,
    pub groups: Arc<JobGroupService>,
    pub policies: Arc<PolicyService>,
}

/// HTTP status for a service error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::External => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let routes = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/{id}", get(handlers::get_job).delete(handlers::delete_job))
        .route("/jobs/promote/{id}", put(handlers::promote_job))
        .route("/jobs/update/{id}", put(handlers::report_job))
        .route(
            "/jobs/executable/orchestrator/{orchestrator}/owner/{owner}",
            get(handlers::executable_jobs),
        )
        .route(
            "/jobgroups",
            get(group_handlers::list_job_groups)
                .post(group_handlers::create_job_group)
                .put(group_handlers::replace_job_group),
        )
        .route(
            "/jobgroups/{id}",
            get(group_handlers::get_job_group).delete(group_handlers::delete_job_group),
        )
        .route("/jobgroups/start/{id}", put(group_handlers::start_job_group))
        .route("/jobgroups/undeploy/{id}", put(group_handlers::stop_job_group))
        .route("/jobgroups/reallocate/{job_id}", put(group_handlers::reallocate_job))
        .route(
            "/resources/status/{job_id}",
            get(handlers::get_resource_status).put(handlers::update_resource_status),
        )
        .route("/policies/incompliance/create", post(handlers::policy_incompliance))
        .route("/policies/remediations/{resource_id}", get(handlers::list_remediations))
        .with_state(state);

    Router::new().nest("/jobmanager", routes)
}
