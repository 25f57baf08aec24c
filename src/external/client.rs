//! HTTP implementation of the external service.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{header, Client, Url};
use serde_json::Value;

use super::{ExternalService, UpstreamError};
use crate::http::request::X_REQUEST_ID;

/// Upper bound on the upstream body we are willing to buffer.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Calls a plain or TLS JSON endpoint with a whole-call deadline.
pub struct HttpExternalService {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpExternalService {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let url = Url::parse(url).map_err(|e| UpstreamError::Request(e.to_string()))?;
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .no_proxy()
            .user_agent(concat!("apm-workload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self { client, url, timeout })
    }

    async fn call(&self, correlation_id: &str) -> Result<Value, UpstreamError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .header(header::ACCEPT, "application/json")
            .header(X_REQUEST_ID.as_str(), correlation_id)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::BadStatus(status.as_u16()));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if bytes.len() + chunk.len() > MAX_PAYLOAD_BYTES {
                return Err(UpstreamError::InvalidPayload(format!(
                    "body exceeds {} bytes",
                    MAX_PAYLOAD_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::InvalidPayload(e.to_string()))
    }

    fn classify(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else if error.is_builder() {
            UpstreamError::Request(error.to_string())
        } else if error.is_body() || error.is_decode() {
            UpstreamError::InvalidPayload(error.to_string())
        } else {
            UpstreamError::Unreachable(error.to_string())
        }
    }
}

impl ExternalService for HttpExternalService {
    fn name(&self) -> &str {
        self.url.host_str().unwrap_or("external")
    }

    fn fetch<'a>(&'a self, correlation_id: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        async move { self.call(correlation_id).await }.boxed()
    }
}
