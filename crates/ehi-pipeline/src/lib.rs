//! The ingestion and scoring pipeline.
//!
//! [`Pipeline`] sequences the four synthetic source ingestors and the
//! aggregate → score → persist step over any [`ehi_core::store::SiteStore`],
//! allowing at most one run at a time.

pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod score;

pub use error::{Error, Result, Step};
pub use orchestrator::{
  IngestCount, Pipeline, PipelineStatus, RunKind, RunOutcome, RunRecord, RunReport, RunState,
  Trigger,
};
pub use score::{EhiResult, SiteMetadata};

#[cfg(test)]
mod testing;
