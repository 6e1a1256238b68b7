//! Async HTTP client wrapping the EHI JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use ehi_core::{scoring::PartialWeights, site::Site};
use ehi_pipeline::{EhiResult, PipelineStatus, RunReport};
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

/// Full runs can take a while on large registries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
pub struct RunResponse {
  pub message: String,
  pub report:  RunReport,
}

#[derive(Debug, Deserialize)]
pub struct IngestResponse {
  pub source:       String,
  pub rows:         usize,
  pub sites_scored: usize,
}

/// Async HTTP client for the EHI JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    tracing::debug!(path, "GET");
    let resp = self
      .client
      .get(self.url(path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    decode("GET", path, resp).await
  }

  async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
    tracing::debug!(path, "POST");
    let mut req = self.client.post(self.url(path));
    if let Some(body) = body {
      req = req.json(&body);
    }
    let resp = req.send().await.with_context(|| format!("POST {path} failed"))?;
    decode("POST", path, resp).await
  }

  // ── Runs ──────────────────────────────────────────────────────────────────

  /// `POST /api/pipeline/run`
  pub async fn run(&self) -> Result<RunResponse> { self.post("/pipeline/run", None).await }

  /// `POST /api/pipeline/recompute`
  pub async fn recompute(&self) -> Result<RunResponse> {
    self.post("/pipeline/recompute", None).await
  }

  /// `POST /api/ingest/{source}`
  pub async fn ingest(&self, source: &str) -> Result<IngestResponse> {
    self.post(&format!("/ingest/{source}"), None).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `POST /api/calculate-ehi`
  pub async fn calculate(&self, weights: PartialWeights) -> Result<Vec<EhiResult>> {
    self.post("/calculate-ehi", Some(json!({ "weights": weights }))).await
  }

  /// `GET /api/status`
  pub async fn status(&self) -> Result<PipelineStatus> { self.get("/status").await }

  /// `GET /api/sites`
  pub async fn sites(&self) -> Result<Vec<Site>> { self.get("/sites").await }
}

/// Deserialise a success body, or turn an error body into an error message.
async fn decode<T: DeserializeOwned>(method: &str, path: &str, resp: Response) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|v| v["message"].as_str().or(v["error"].as_str()).map(str::to_owned))
      .unwrap_or_else(|| status.to_string());
    return Err(anyhow!("{method} {path} → {status}: {message}"));
  }
  resp.json().await.with_context(|| format!("deserialising {path} response"))
}
