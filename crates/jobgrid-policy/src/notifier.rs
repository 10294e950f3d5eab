//! Policy manager registration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use jobgrid_core::HttpClient;
use jobgrid_state::JobGroup;

use crate::error::{PolicyError, PolicyResult};

pub const SERVICE_NAME: &str = "job-manager";
pub const INCOMPLIANCE_CALLBACK: &str = "/jobmanager/policies/incompliance/create";
const REGISTRY_PATH: &str = "/polman/registry/api/v1/etsn/";

/// Registration of an application instance with the policy manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub app_instance: String,
    pub service: String,
    pub app_descriptor: String,
    pub common_action: Action,
}

/// The callback the policy manager invokes on a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub uri: String,
    pub http_method: String,
    pub include_access_token: bool,
    pub extra_parameters: Map<String, Value>,
}

impl Notification {
    /// Register `group`, created from `descriptor`, with an incompliance
    /// callback into this service.
    pub fn registration(group: &JobGroup, descriptor: &str) -> Self {
        Self {
            app_instance: group.id.clone(),
            service: SERVICE_NAME.to_string(),
            app_descriptor: descriptor.to_string(),
            common_action: Action {
                uri: INCOMPLIANCE_CALLBACK.to_string(),
                http_method: "POST".to_string(),
                include_access_token: true,
                extra_parameters: Map::new(),
            },
        }
    }
}

#[async_trait]
pub trait PolicyManagerClient: Send + Sync {
    async fn notify(
        &self,
        notification: &Notification,
        authorization: Option<&str>,
    ) -> PolicyResult<()>;
}

/// `POST {base_url}/polman/registry/api/v1/etsn/` over HTTP.
pub struct HttpPolicyManager {
    endpoint: String,
    http: HttpClient,
}

impl HttpPolicyManager {
    pub fn new(base_url: &str, http: HttpClient) -> Self {
        Self {
            endpoint: format!("{}{REGISTRY_PATH}", base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PolicyManagerClient for HttpPolicyManager {
    async fn notify(
        &self,
        notification: &Notification,
        authorization: Option<&str>,
    ) -> PolicyResult<()> {
        let body =
            serde_json::to_vec(notification).map_err(|e| PolicyError::Encode(e.to_string()))?;
        let resp = self
            .http
            .post(&self.endpoint, "application/json", body, authorization)
            .await?;
        // Only 200 and 201 count.
        if resp.status.as_u16() != 200 && resp.status.as_u16() != 201 {
            return Err(PolicyError::PolicyManager {
                status: resp.status.as_u16(),
                body: resp.body_text(),
            });
        }
        debug!(endpoint = %self.endpoint, app_instance = %notification.app_instance, "policy manager notified");
        Ok(())
    }
}
