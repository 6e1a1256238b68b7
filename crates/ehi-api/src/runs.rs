//! Handlers that start pipeline runs.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/pipeline/run` | Full run; 409 if a run is in progress |
//! | `POST` | `/pipeline/recompute` | Scoring only; 409 if a run is in progress |
//!
//! Runs are spawned onto their own task, so a client that disconnects does
//! not cancel a run halfway through.

use std::sync::Arc;

use axum::{Json, extract::State};
use ehi_core::store::SiteStore;
use ehi_pipeline::{Pipeline, RunReport, Trigger};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RunResponse {
  pub success: bool,
  pub message: String,
  pub report:  RunReport,
}

/// `POST /pipeline/run`
pub async fn run<S>(State(pipeline): State<Arc<Pipeline<S>>>) -> Result<Json<RunResponse>, ApiError>
where
  S: SiteStore + 'static,
{
  let report = tokio::spawn(async move { pipeline.run_full(Trigger::Manual).await }).await??;

  let rows: usize = report.ingested.iter().map(|c| c.rows).sum();
  Ok(Json(RunResponse {
    success: true,
    message: format!(
      "Pipeline completed: {rows} rows from {} sources, {} sites scored",
      report.ingested.len(),
      report.sites_scored,
    ),
    report,
  }))
}

/// `POST /pipeline/recompute`
pub async fn recompute<S>(
  State(pipeline): State<Arc<Pipeline<S>>>,
) -> Result<Json<RunResponse>, ApiError>
where
  S: SiteStore + 'static,
{
  let report = tokio::spawn(async move { pipeline.recompute(Trigger::Manual).await }).await??;

  Ok(Json(RunResponse {
    success: true,
    message: format!("Recomputed scores for {} sites", report.sites_scored),
    report,
  }))
}
