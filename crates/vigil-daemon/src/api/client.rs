use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use vigil_types::{EventRecord, VigilError, VigilResult};

use super::responses::*;
use crate::storage::{DependencyCheck, EvidenceRecord};

/// Client for a running supervisor's local API.
pub struct SupervisorClient {
    base_url: String,
    http: Client,
}

impl SupervisorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VigilResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VigilError::Api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn status(&self) -> VigilResult<StatusResponse> {
        self.get("/api/status").await
    }

    /// Health is returned even when the API answers 503.
    pub async fn health(&self) -> VigilResult<HealthResponse> {
        self.get("/api/health").await
    }

    pub async fn events(&self, limit: usize) -> VigilResult<Vec<EventRecord>> {
        self.get(&format!("/api/events?limit={}", limit)).await
    }

    pub async fn reset_restart_budget(&self) -> VigilResult<u32> {
        let response: ResetResponse = self.post("/api/restarts/reset", &()).await?;
        Ok(response.cleared)
    }

    pub async fn record_evidence(&self, record: &EvidenceRecord) -> VigilResult<()> {
        let _: AcceptedResponse = self.post("/api/evidence", record).await?;
        Ok(())
    }

    pub async fn record_dependency(&self, check: &DependencyCheck) -> VigilResult<()> {
        let _: AcceptedResponse = self.post("/api/dependencies", check).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> VigilResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("HTTP GET: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| VigilError::Api(format!("GET {} failed: {}", url, e)))?;
        unwrap_envelope(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> VigilResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("HTTP POST: {}", url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| VigilError::Api(format!("POST {} failed: {}", url, e)))?;
        unwrap_envelope(response).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> VigilResult<T> {
    let status = response.status();
    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| VigilError::Api(format!("Unreadable response (HTTP {}): {}", status, e)))?;

    match (envelope.data, envelope.error) {
        (Some(data), _) => Ok(data),
        (None, Some(error)) => Err(VigilError::Api(match error.details {
            Some(details) => format!("{}: {} ({})", error.error, error.message, details),
            None => format!("{}: {}", error.error, error.message),
        })),
        (None, None) => Err(VigilError::Api(format!("Empty response (HTTP {})", status))),
    }
}
