//! REST client for the V&V API

use anyhow::{anyhow, Context, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use vv_common::{Run, RunStatus, RunSummary, Script, Srs, TestCase, TestResult};

/// `GET /api/reports/latest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestReport {
    pub run_id: i64,
    pub status: RunStatus,
    #[serde(flatten)]
    pub summary: RunSummary,
}

/// `GET /api/runs/{id}/logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogs {
    pub log_path: String,
    pub tail: String,
}

/// Client for the V&V backend
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// `timeout` bounds every request; runs block until pytest finishes, so
    /// it must cover the server's run timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {}", path);
        let response = self.http.get(self.url(path)).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }

    /// True when `/` answers `Healthy`
    pub async fn health_check(&self) -> bool {
        match self.get::<Value>("/").await {
            Ok(body) => body["message"] == "Healthy",
            Err(_) => false,
        }
    }

    // SRS

    pub async fn create_srs(
        &self,
        title: &str,
        description: Option<&str>,
        content: Option<&str>,
    ) -> Result<Srs> {
        self.post(
            "/api/srs",
            &json!({ "title": title, "description": description, "content": content }),
        )
        .await
    }

    pub async fn get_srs(&self, id: i64) -> Result<Srs> {
        self.get(&format!("/api/srs/{}", id)).await
    }

    pub async fn list_srs(&self) -> Result<Vec<Srs>> {
        self.get("/api/srs").await
    }

    pub async fn delete_srs(&self, id: i64) -> Result<()> {
        let response = self.http.delete(self.url(&format!("/api/srs/{}", id))).send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Err(error_from(response).await)
    }

    /// Multipart upload of a local SRS file
    pub async fn upload_srs(
        &self,
        path: &Path,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Srs> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(data).file_name(file_name));
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }
        if let Some(description) = description {
            form = form.text("description", description.to_string());
        }

        debug!("POST /api/srs/upload ({})", path.display());
        let response = self
            .http
            .post(self.url("/api/srs/upload"))
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    // Generation

    pub async fn generate_test_cases(&self, srs_id: i64) -> Result<Vec<TestCase>> {
        self.post("/api/testcases/generate", &json!({ "id": srs_id })).await
    }

    pub async fn list_test_cases(&self, srs_id: Option<i64>) -> Result<Vec<TestCase>> {
        match srs_id {
            Some(id) => self.get(&format!("/api/testcases?srs_id={}", id)).await,
            None => self.get("/api/testcases").await,
        }
    }

    pub async fn generate_script(&self, test_case_id: i64) -> Result<Script> {
        self.post("/api/scripts/generate", &json!({ "test_case_id": test_case_id }))
            .await
    }

    pub async fn list_scripts(&self, test_case_id: Option<i64>) -> Result<Vec<Script>> {
        match test_case_id {
            Some(id) => self.get(&format!("/api/scripts?test_case_id={}", id)).await,
            None => self.get("/api/scripts").await,
        }
    }

    // Runs

    pub async fn create_run(
        &self,
        script_ids: &[i64],
        label: Option<&str>,
        triggered_by: &str,
    ) -> Result<Run> {
        self.post(
            "/api/runs",
            &json!({ "script_ids": script_ids, "label": label, "triggered_by": triggered_by }),
        )
        .await
    }

    pub async fn list_runs(&self) -> Result<Vec<Run>> {
        self.get("/api/runs").await
    }

    pub async fn get_run(&self, id: i64) -> Result<Run> {
        self.get(&format!("/api/runs/{}", id)).await
    }

    pub async fn run_results(&self, id: i64) -> Result<Vec<TestResult>> {
        self.get(&format!("/api/runs/{}/results", id)).await
    }

    pub async fn run_logs(&self, id: i64) -> Result<RunLogs> {
        self.get(&format!("/api/runs/{}/logs", id)).await
    }

    pub async fn latest_report(&self) -> Result<LatestReport> {
        self.get("/api/reports/latest").await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    Ok(response.json::<T>().await?)
}

/// Error carrying the API's `{"message"}` when present
async fn error_from(response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow!("{} ({})", api_message(&body), status)
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
