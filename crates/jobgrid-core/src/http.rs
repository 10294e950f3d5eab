//! Outbound HTTP client for the matchmaking and policy manager collaborators.
//!
//! A thin wrapper over hyper's pooled client. Every exchange (connect,
//! send, and body read) runs under a single deadline.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Method, Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("failed to build request: {0}")]
    Request(String),

    #[error("request to {uri} failed: {reason}")]
    Transport { uri: String, reason: String },

    #[error("request to {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
}

/// Status and fully-read body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// The body as lossy UTF-8, for error messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let inner = Client::builder(TokioExecutor::new()).build_http();
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `body` to `url`.
    ///
    /// `authorization` is copied verbatim into the `Authorization` header,
    /// so callers forward the inbound header value unchanged.
    pub async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        authorization: Option<&str>,
    ) -> Result<HttpResponse, HttpError> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
            uri: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::USER_AGENT, "jobgrid/0.1");
        if let Some(value) = authorization {
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::Request(format!("authorization header: {e}")))?;
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let req = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| HttpError::Request(e.to_string()))?;

        let transport = |reason: String| HttpError::Transport {
            uri: url.to_string(),
            reason,
        };

        let exchange = async {
            let resp = self
                .inner
                .request(req)
                .await
                .map_err(|e| transport(e.to_string()))?;
            let status = resp.status();
            let body = read_body(resp.into_body())
                .await
                .map_err(|e| transport(e.to_string()))?;
            Ok(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                if let Ok(resp) = &result {
                    debug!(%url, status = %resp.status, "outbound request completed");
                }
                result
            }
            Err(_) => Err(HttpError::Timeout {
                uri: url.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

async fn read_body(body: hyper::body::Incoming) -> Result<Bytes, hyper::Error> {
    Ok(body.collect().await?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::post;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn post_forwards_body_and_authorization() {
        let router = Router::new().route(
            "/echo",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let ctype = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                format!("{auth}|{ctype}|{body}")
            }),
        );
        let base = serve(router).await;

        let client = HttpClient::new(Duration::from_secs(5));
        let resp = client
            .post(
                &format!("{base}/echo"),
                "application/x-yaml",
                b"name: demo".to_vec(),
                Some("Bearer abc"),
            )
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body_text(), "Bearer abc|application/x-yaml|name: demo");
    }

    #[tokio::test]
    async fn post_reports_non_2xx_status_without_error() {
        let router = Router::new().route(
            "/fail",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(router).await;

        let client = HttpClient::new(Duration::from_secs(5));
        let resp = client
            .post(&format!("{base}/fail"), "application/json", Vec::new(), None)
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
        assert_eq!(resp.body_text(), "upstream down");
    }

    #[tokio::test]
    async fn post_times_out() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(router).await;

        let client = HttpClient::new(Duration::from_millis(100));
        let err = client
            .post(&format!("{base}/slow"), "application/json", Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Timeout { .. }));
    }

    #[tokio::test]
    async fn post_rejects_invalid_uri() {
        let client = HttpClient::new(Duration::from_secs(1));
        let err = client
            .post("not a uri", "application/json", Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidUri { .. }));
    }

    #[tokio::test]
    async fn post_reports_connection_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(Duration::from_secs(2));
        let err = client
            .post(&format!("http://{addr}/x"), "application/json", Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport { .. }));
    }
}
