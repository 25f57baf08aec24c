use std::collections::BTreeMap;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub type SdkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorRate {
    pub current_error_rate: f64,
    pub request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorRateUpdate {
    pub message: String,
    pub old_error_rate: f64,
    pub new_error_rate: f64,
    pub request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub total_requests: u64,
    pub endpoints: BTreeMap<String, u64>,
    pub current_error_rate: f64,
    pub log_sink_failures: u64,
    pub uptime_seconds: u64,
    pub available_endpoints: Vec<String>,
    pub request_id: String,
}

pub struct WorkloadClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WorkloadClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` on error-rate updates.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub async fn get_error_rate(&self) -> Result<ErrorRate, SdkError> {
        let resp = self.get("/api/get-error-rate").await?;
        decode(resp).await
    }

    /// Replace the error rate. Out-of-range values come back as an error
    /// carrying the service's 400 body.
    pub async fn set_error_rate(&self, error_rate: f64) -> Result<ErrorRateUpdate, SdkError> {
        let mut req = self
            .client
            .post(format!("{}/api/set-error-rate", self.base_url))
            .json(&serde_json::json!({ "error_rate": error_rate }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        decode(req.send().await?).await
    }

    pub async fn stats(&self) -> Result<Stats, SdkError> {
        let resp = self.get("/api/stats").await?;
        decode(resp).await
    }

    /// Plain GET against any endpoint.
    pub async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(format!("Service returned error status {}: {}", status, text).into());
    }

    Ok(serde_json::from_str::<T>(&text)?)
}
