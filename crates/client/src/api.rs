//! REST API client for the gait-analysis backend endpoints.
//!
//! Wraps the backend HTTP API (health probe, video upload, status
//! polling, analysis listing, report retrieval) using [`reqwest`].
//! Response DTOs tolerate missing optional fields; the backend is a
//! separately deployed service whose payloads may grow.

use std::time::Duration;

use serde::Deserialize;

use gaitview_core::types::{ReportAudience, Timestamp, ViewType};

/// HTTP client for a single backend deployment.
pub struct GaitApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response returned by the upload endpoint after the video has been
/// accepted for processing.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Server-assigned identifier for the analysis job.
    pub analysis_id: String,
}

/// The backend's own status enum for an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Processing,
    Completed,
    Failed,
}

/// One poll response from `GET /api/v1/analysis/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisStatusResponse {
    pub status: BackendStatus,
    /// Wire name of the pipeline stage currently running.
    #[serde(default)]
    pub current_step: Option<String>,
    /// Percentage in 0..=100 for the current stage.
    #[serde(default)]
    pub step_progress: Option<u8>,
    /// Free-text progress description.
    #[serde(default)]
    pub step_message: Option<String>,
    /// Failure description when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Biomechanical metrics, present once the analysis completed.
    #[serde(default)]
    pub metrics: Option<serde_json::Value>,
}

/// Response of `GET /api/v1/analysis/list`.
#[derive(Debug, Deserialize)]
pub struct AnalysisList {
    #[serde(default)]
    pub analyses: Vec<AnalysisSummary>,
}

/// One row of the analysis listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSummary {
    pub analysis_id: String,
    pub status: BackendStatus,
    #[serde(default)]
    pub view_type: Option<ViewType>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum GaitApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout) or
    /// the body could not be decoded.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },
}

impl GaitApiError {
    /// Whether this error is an HTTP 404 from the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GaitApiError::Api { status: 404, .. })
    }
}

impl GaitApi {
    /// Create a new API client for a backend deployment.
    ///
    /// * `base_url` - absolute origin, e.g. `http://localhost:8000`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Backend origin this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness probe: `GET /api/v1/health` with a bounded timeout.
    ///
    /// Only the HTTP status matters; the body is discarded.
    pub async fn health(&self, timeout: Duration) -> Result<(), GaitApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/health", self.base_url))
            .timeout(timeout)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Submit a walking video: `POST /api/v1/analysis/upload`.
    ///
    /// The multipart `form` carries the `file` part and the
    /// `view_type` field; building it (including progress tracking) is
    /// the caller's concern. `timeout` bounds the whole transfer.
    pub async fn upload(
        &self,
        form: reqwest::multipart::Form,
        timeout: Duration,
    ) -> Result<UploadResponse, GaitApiError> {
        let response = self
            .client
            .post(format!("{}/api/v1/analysis/upload", self.base_url))
            .multipart(form)
            .timeout(timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Poll one analysis: `GET /api/v1/analysis/{id}`.
    pub async fn get_analysis(&self, id: &str) -> Result<AnalysisStatusResponse, GaitApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/analysis/{}", self.base_url, id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List all analyses known to the backend: `GET /api/v1/analysis/list`.
    pub async fn list_analyses(&self) -> Result<AnalysisList, GaitApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/analysis/list", self.base_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a rendered report: `GET /api/v1/reports/{id}?audience=...`.
    ///
    /// The report payload is backend-defined; it is passed through as
    /// raw JSON for the rendering layer.
    pub async fn get_report(
        &self,
        id: &str,
        audience: ReportAudience,
    ) -> Result<serde_json::Value, GaitApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/reports/{}", self.base_url, id))
            .query(&[("audience", audience.as_str())])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GaitApiError::Api`] with
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GaitApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GaitApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GaitApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), GaitApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        let err = GaitApiError::Api {
            status: 404,
            body: "not found".into(),
        };
        assert!(err.is_not_found());

        let err = GaitApiError::Api {
            status: 500,
            body: "boom".into(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let json = r#"{"status":"processing"}"#;
        let resp: AnalysisStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, BackendStatus::Processing);
        assert!(resp.current_step.is_none());
        assert!(resp.step_progress.is_none());
        assert!(resp.metrics.is_none());
    }

    #[test]
    fn status_response_full_payload() {
        let json = r#"{
            "status": "processing",
            "current_step": "3d_lifting",
            "step_progress": 40,
            "step_message": "Lifting keypoints",
            "metrics": null
        }"#;
        let resp: AnalysisStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.current_step.as_deref(), Some("3d_lifting"));
        assert_eq!(resp.step_progress, Some(40));
    }

    #[test]
    fn list_response_defaults_to_empty() {
        let resp: AnalysisList = serde_json::from_str("{}").unwrap();
        assert!(resp.analyses.is_empty());
    }
}
