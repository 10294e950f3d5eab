//! Matchmaking service client.

use async_trait::async_trait;
use jobgrid_core::HttpClient;
use tracing::debug;

use crate::error::{AllocatorError, AllocatorResult};
use crate::request::AllocationRequest;

/// The external placement service, by contract only.
#[async_trait]
pub trait MatchmakingClient: Send + Sync {
    /// Submit a descriptor and return the raw allocation response body.
    async fn matchmake(&self, request: AllocationRequest) -> AllocatorResult<Vec<u8>>;
}

/// `POST {base_url}/matchmake` over HTTP.
pub struct HttpMatchmakingClient {
    endpoint: String,
    http: HttpClient,
}

impl HttpMatchmakingClient {
    pub fn new(base_url: &str, http: HttpClient) -> Self {
        Self {
            endpoint: format!("{}/matchmake", base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MatchmakingClient for HttpMatchmakingClient {
    async fn matchmake(&self, request: AllocationRequest) -> AllocatorResult<Vec<u8>> {
        let resp = self
            .http
            .post(
                &self.endpoint,
                request.content_type,
                request.body,
                request.authorization.as_deref(),
            )
            .await?;
        if !resp.status.is_success() {
            return Err(AllocatorError::Matchmaking {
                status: resp.status.as_u16(),
                body: resp.body_text(),
            });
        }
        debug!(endpoint = %self.endpoint, bytes = resp.body.len(), "allocation received");
        Ok(resp.body.to_vec())
    }
}
