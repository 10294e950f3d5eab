//! Service wiring and the HTTP server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, info_span, warn};

use jobgrid_allocator::{Allocator, HttpMatchmakingClient};
use jobgrid_api::ApiState;
use jobgrid_core::{HttpClient, JobgridConfig};
use jobgrid_orchestrator::JobGroupService;
use jobgrid_policy::{HttpPolicyManager, PolicyService};
use jobgrid_scheduler::{JobService, LeaseConfig, ResourceService};
use jobgrid_state::StateStore;

/// Assemble every service over `store` from a validated configuration.
pub fn build_state(config: &JobgridConfig, store: StateStore) -> anyhow::Result<ApiState> {
    let matchmaking_url = config
        .matchmaking
        .url
        .as_deref()
        .context("matchmaking.url is required")?;
    let policy_manager_url = config
        .policy_manager
        .url
        .as_deref()
        .context("policy_manager.url is required")?;

    let matchmaker = HttpMatchmakingClient::new(
        matchmaking_url,
        HttpClient::new(config.matchmaking.timeout()),
    );
    info!(endpoint = %matchmaker.endpoint(), "matchmaking client configured");
    let policy_manager = HttpPolicyManager::new(
        policy_manager_url,
        HttpClient::new(config.policy_manager.timeout()),
    );
    info!(endpoint = %policy_manager.endpoint(), "policy manager client configured");

    let lease = LeaseConfig::from_secs(config.lease.duration_secs);
    let jobs = Arc::new(JobService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        lease,
        info_span!("job_service"),
    ));
    let resources = Arc::new(ResourceService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        info_span!("resource_service"),
    ));
    let policies = Arc::new(PolicyService::new(
        jobs.clone(),
        Arc::new(store.clone()),
        info_span!("policy_service"),
    ));
    let groups = Arc::new(JobGroupService::new(
        Arc::new(store),
        jobs.clone(),
        Allocator::new(Arc::new(matchmaker)),
        Arc::new(policy_manager),
        info_span!("job_group_service"),
    ));

    Ok(ApiState {
        jobs,
        resources,
        groups,
        policies,
    })
}

pub async fn run(config: JobgridConfig) -> anyhow::Result<()> {
    info!("Jobgrid job manager starting");

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("create data directory {}", config.storage.data_dir.display())
    })?;
    let db_path = config.storage.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    if config.auth.public_key.is_none() {
        warn!("no identity provider public key configured; tokens are forwarded unchecked");
    }
    info!(lease_secs = config.lease.duration_secs, "lease configured");

    let router = jobgrid_api::build_router(build_state(&config, store)?);
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("Jobgrid job manager stopped");
    Ok(())
}
