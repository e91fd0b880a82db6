use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::future::Future;
use tracing::trace;

use crate::transport::{Method, RemoteCommandRequest};

/// Raw response as seen by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }

    /// `200 OK` style rendering used in diagnostics.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }
}

/// Performs one authenticated HTTP attempt.
///
/// Connection failures, timeouts and TLS errors come back as `Err`; any
/// HTTP response, whatever its status, is `Ok`.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &RemoteCommandRequest,
        token: &str,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;
}

/// reqwest-backed transport. Certificate checks are off: the control
/// endpoints sit behind self-signed or internal certificates.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    fn build_client(request: &RemoteCommandRequest, token: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).context("invalid bearer token")?,
        );

        Client::builder()
            .timeout(request.timeout)
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .build()
            .context("building http client")
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &RemoteCommandRequest, token: &str) -> Result<TransportResponse> {
        let client = Self::build_client(request, token)?;
        let url = request.url();

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };

        trace!(
            url = %url,
            method = %request.method,
            timeout_secs = %request.timeout.as_secs(),
            "sending control request"
        );

        // Parameters always travel in the query string, whatever the method.
        let resp = client
            .request(method, &url)
            .query(&request.query_pairs())
            .send()
            .await
            .with_context(|| format!("{} {}", request.method, url))?;

        let status = resp.status();
        let bytes = resp.bytes().await.context("read response body")?;

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
