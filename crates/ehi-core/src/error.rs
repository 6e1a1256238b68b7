//! Error types for `ehi-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("weights must sum to 1.0 (±{tolerance}), got {sum:.3}")]
  WeightSum { sum: f64, tolerance: f64 },

  #[error("weight {name} must be a finite value in [0, 1], got {value}")]
  WeightOutOfRange { name: &'static str, value: f64 },

  #[error("unknown source {0:?}; expected one of gbif, climate, landcover, footprint")]
  UnknownSource(String),

  #[error("unknown land cover type: {0:?}")]
  UnknownLandCover(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
