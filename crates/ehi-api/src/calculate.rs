//! Handler for `POST /calculate-ehi`.
//!
//! Body: `{"weights": {"biodiversity": 0.3, "climate": 0.25, "humanPressure": 0.25, "vegetation": 0.2}}`.
//! The body, the `weights` object and each field are optional; omissions
//! take the default weights. Nothing is persisted.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use ehi_core::{scoring::PartialWeights, store::SiteStore};
use ehi_pipeline::{EhiResult, Pipeline};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct CalculateBody {
  #[serde(default)]
  pub weights: PartialWeights,
}

/// `POST /calculate-ehi`
pub async fn handler<S>(
  State(pipeline): State<Arc<Pipeline<S>>>,
  body: Bytes,
) -> Result<Json<Vec<EhiResult>>, ApiError>
where
  S: SiteStore + 'static,
{
  let body: CalculateBody = if body.iter().all(u8::is_ascii_whitespace) {
    CalculateBody::default()
  } else {
    serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))?
  };

  Ok(Json(pipeline.calculate_ehi(body.weights).await?))
}
