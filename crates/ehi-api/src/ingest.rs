//! Handler for `POST /ingest/{source}`.
//!
//! `source` is one of `gbif`, `climate`, `landcover` or `footprint`. The
//! source is re-ingested and every site rescored under the run lock.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use ehi_core::{source::SourceKind, store::SiteStore};
use ehi_pipeline::{Pipeline, Trigger};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  pub success:      bool,
  pub source:       &'static str,
  pub rows:         usize,
  pub sites_scored: usize,
}

/// `POST /ingest/{source}`
pub async fn handler<S>(
  State(pipeline): State<Arc<Pipeline<S>>>,
  Path(source): Path<String>,
) -> Result<Json<IngestResponse>, ApiError>
where
  S: SiteStore + 'static,
{
  let kind: SourceKind = source.parse()?;

  let report =
    tokio::spawn(async move { pipeline.ingest_source(kind, Trigger::Manual).await }).await??;

  Ok(Json(IngestResponse {
    success:      true,
    source:       kind.name(),
    rows:         report.ingested.iter().map(|c| c.rows).sum(),
    sites_scored: report.sites_scored,
  }))
}
