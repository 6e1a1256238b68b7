//! Error type for `ehi-pipeline`.

use std::fmt;

use ehi_core::{site::SiteId, source::SourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stage of a pipeline run, used to identify where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "source", rename_all = "snake_case")]
pub enum Step {
  Ingest(SourceKind),
  Aggregate,
  Persist,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Step::Ingest(kind) => write!(f, "ingest {kind}"),
      Step::Aggregate => f.write_str("aggregate"),
      Step::Persist => f.write_str("persist"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Another run holds the single-run lock.
  #[error("a pipeline run is already in progress")]
  AlreadyRunning,

  #[error("validation error: {0}")]
  Validation(#[from] ehi_core::Error),

  #[error("{step} failed: {source}")]
  Step {
    step:   Step,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// A store call made outside any run step failed.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Some score updates failed; the others were written.
  #[error("failed to persist scores for {} of {attempted} sites", failed.len())]
  Persist {
    attempted: usize,
    failed:    Vec<(SiteId, String)>,
  },
}

impl Error {
  pub(crate) fn step<E>(step: Step, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Step { step, source: Box::new(source) }
  }

  pub(crate) fn store<E>(source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(source))
  }

  /// The step a run failed in, if the error came from a running step.
  pub fn failed_step(&self) -> Option<Step> {
    match self {
      Error::Step { step, .. } => Some(*step),
      Error::Persist { .. } => Some(Step::Persist),
      Error::AlreadyRunning | Error::Validation(_) | Error::Store(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
