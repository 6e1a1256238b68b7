//! HTTP server, scheduling and startup wiring for the ecosystem health
//! pipeline.
//!
//! Exposes the axum [`Router`] (health check plus the JSON API under `/api`),
//! the runtime [`ServerConfig`], connection retry, registry seeding and the
//! two automatic triggers.

pub mod connect;
pub mod scheduler;
pub mod seed;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  http::{Method, StatusCode, Uri},
  response::IntoResponse,
  routing::get,
};
use chrono::Utc;
use ehi_core::{site::NewSite, store::SiteStore};
use ehi_pipeline::Pipeline;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `EHI_*`
/// environment variables. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  /// Delay before the one-shot startup run.
  pub startup_delay_secs:     u64,
  /// Six-field cron expression (with seconds), evaluated in UTC.
  pub daily_schedule:         String,
  /// Disables both automatic triggers when `false`.
  pub scheduler_enabled:      bool,
  pub connect_attempts:       u32,
  pub connect_retry_delay_ms: u64,
  /// Registered when the site registry is empty.
  pub sites:                  Vec<NewSite>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   "0.0.0.0".to_string(),
      port:                   3001,
      store_path:             PathBuf::from("ehi.db"),
      startup_delay_secs:     15,
      daily_schedule:         "0 0 2 * * *".to_string(),
      scheduler_enabled:      true,
      connect_attempts:       10,
      connect_retry_delay_ms: 3000,
      sites:                  Vec::new(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router around `pipeline`.
pub fn router<S>(pipeline: Arc<Pipeline<S>>) -> Router
where
  S: SiteStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", ehi_api::api_router(pipeline))
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
}

/// `GET /health`
async fn health() -> impl IntoResponse {
  Json(json!({
    "status":    "OK",
    "message":   "EHI pipeline server is running",
    "timestamp": Utc::now().to_rfc3339(),
  }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
  (
    StatusCode::NOT_FOUND,
    Json(json!({
      "success": false,
      "error":   "route not found",
      "message": format!("no route for {method} {}", uri.path()),
      "path":    uri.path(),
    })),
  )
}

// ─── Integration tests ────────────────────────────────────────────────────────
