//! The `SiteStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `ehi-store-sqlite`).
//! The pipeline and the request layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  aggregate::AggregateRow,
  scoring::SiteScores,
  site::{NewSite, Site, SiteId},
  source::SourceRows,
};

/// Rows written per insert statement group when replacing a source table.
///
/// Bounds the size of a single write; it carries no commit semantics for the
/// table as a whole.
pub const INSERT_BATCH_SIZE: usize = 25;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Row counts for every table the pipeline touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
  pub sites:          u64,
  pub occurrence:     u64,
  pub climate:        u64,
  pub land_cover:     u64,
  pub human_pressure: u64,
}

/// Snapshot returned by [`SiteStore::status`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreStatus {
  pub counts:            TableCounts,
  /// Average composite over sites that have been scored; `None` if none have.
  pub avg_composite_ehi: Option<f64>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the site registry and source tables.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SiteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Site registry ─────────────────────────────────────────────────────

  /// Register a new site and return it with its assigned id.
  fn add_site(
    &self,
    site: NewSite,
  ) -> impl Future<Output = Result<Site, Self::Error>> + Send + '_;

  /// All sites, ordered by id.
  fn list_sites(
    &self,
  ) -> impl Future<Output = Result<Vec<Site>, Self::Error>> + Send + '_;

  // ── Source tables ─────────────────────────────────────────────────────

  /// Replace the contents of one source table with `rows`.
  ///
  /// Deletes every existing row, then inserts `rows` in groups of
  /// [`INSERT_BATCH_SIZE`]. **Not atomic**: if a group fails the table is
  /// left partially populated and the error is returned. Readers may observe
  /// the table empty or half-filled while this runs. The next successful call
  /// restores a consistent table.
  ///
  /// Returns the number of rows written.
  fn replace_all(
    &self,
    rows: SourceRows,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Aggregation & persistence ─────────────────────────────────────────

  /// Join every site against the source tables.
  ///
  /// Occurrences are attached by proximity: those within `radius_km` of the
  /// site count toward it. Climate and human-pressure values are averaged,
  /// land cover takes the maximum coverage. Sources without rows for a site
  /// leave the corresponding fields `None`.
  fn aggregate(
    &self,
    radius_km: f64,
  ) -> impl Future<Output = Result<Vec<AggregateRow>, Self::Error>> + Send + '_;

  /// Write the scoring block of one site, stamped with `at`.
  fn update_scores(
    &self,
    site_id: SiteId,
    scores: SiteScores,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Row counts and the average composite score.
  fn status(
    &self,
  ) -> impl Future<Output = Result<StoreStatus, Self::Error>> + Send + '_;
}
