//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Rendered as `{"success": false, "error": "<status reason>", "message": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Pipeline(#[from] ehi_pipeline::Error),

  /// The spawned run task panicked or was aborted.
  #[error("run task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use ehi_pipeline::Error as P;
    match self {
      ApiError::BadRequest(_) | ApiError::Pipeline(P::Validation(_)) => StatusCode::BAD_REQUEST,
      ApiError::Pipeline(P::AlreadyRunning) => StatusCode::CONFLICT,
      ApiError::Pipeline(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<ehi_core::Error> for ApiError {
  fn from(e: ehi_core::Error) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let message = match &self {
      ApiError::BadRequest(m) => m.clone(),
      other => other.to_string(),
    };
    let body = json!({
      "success": false,
      "error":   status.canonical_reason().unwrap_or("error"),
      "message": message,
    });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pipeline_errors_map_to_status_codes() {
    let cases = [
      (ApiError::from(ehi_pipeline::Error::AlreadyRunning), StatusCode::CONFLICT),
      (
        ApiError::from(ehi_pipeline::Error::Validation(ehi_core::Error::WeightSum {
          sum:       0.8,
          tolerance: 0.01,
        })),
        StatusCode::BAD_REQUEST,
      ),
      (
        ApiError::from(ehi_pipeline::Error::Persist { attempted: 3, failed: vec![(2, "locked".into())] }),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
      (ApiError::from(ehi_core::Error::UnknownSource("ebird".into())), StatusCode::BAD_REQUEST),
    ];
    for (err, expected) in cases {
      assert_eq!(err.status(), expected, "{err}");
    }
  }

  #[tokio::test]
  async fn body_carries_reason_and_message() {
    let resp = ApiError::from(ehi_pipeline::Error::AlreadyRunning).into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Conflict");
    assert_eq!(body["message"], "a pipeline run is already in progress");
  }
}
