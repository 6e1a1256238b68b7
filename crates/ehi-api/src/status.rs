//! Read-only handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/status` | Table counts, average composite, run state, last run |
//! | `GET`  | `/sites` | The site registry with persisted scores |

use std::sync::Arc;

use axum::{Json, extract::State};
use ehi_core::{site::Site, store::SiteStore};
use ehi_pipeline::{Pipeline, PipelineStatus};

use crate::error::ApiError;

/// `GET /status`
pub async fn status<S>(
  State(pipeline): State<Arc<Pipeline<S>>>,
) -> Result<Json<PipelineStatus>, ApiError>
where
  S: SiteStore + 'static,
{
  Ok(Json(pipeline.status().await?))
}

/// `GET /sites`
pub async fn sites<S>(State(pipeline): State<Arc<Pipeline<S>>>) -> Result<Json<Vec<Site>>, ApiError>
where
  S: SiteStore + 'static,
{
  let sites = pipeline
    .store()
    .list_sites()
    .await
    .map_err(|e| ApiError::Pipeline(ehi_pipeline::Error::Store(Box::new(e))))?;
  Ok(Json(sites))
}
