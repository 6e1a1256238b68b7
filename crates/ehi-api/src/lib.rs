//! JSON REST API for the ecosystem health pipeline.
//!
//! Exposes an axum [`Router`] backed by a shared [`Pipeline`] over any
//! [`ehi_core::store::SiteStore`]. Transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ehi_api::api_router(pipeline.clone()))
//! ```

pub mod calculate;
pub mod error;
pub mod ingest;
pub mod runs;
pub mod status;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ehi_core::store::SiteStore;
use ehi_pipeline::Pipeline;

pub use error::ApiError;

/// Build a fully-materialised API router for `pipeline`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(pipeline: Arc<Pipeline<S>>) -> Router<()>
where
  S: SiteStore + 'static,
{
  Router::new()
    // Runs
    .route("/pipeline/run", post(runs::run::<S>))
    .route("/pipeline/recompute", post(runs::recompute::<S>))
    .route("/ingest/{source}", post(ingest::handler::<S>))
    // Reads
    .route("/calculate-ehi", post(calculate::handler::<S>))
    .route("/status", get(status::status::<S>))
    .route("/sites", get(status::sites::<S>))
    .with_state(pipeline)
}

#[cfg(test)]
mod tests;
