//! Aggregate → score → persist.

use chrono::Utc;
use ehi_core::{
  aggregate::AggregateRow,
  geo::OCCURRENCE_RADIUS_KM,
  scoring::{PartialWeights, SiteScores, SubScores, Weights, round3},
  site::SiteId,
  source::LandCoverType,
  store::SiteStore,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result, Step};

/// Score every site from the current source tables and persist the results.
///
/// All sites share one timestamp. Updates are issued concurrently; every one
/// is attempted even if some fail, in which case [`Error::Persist`] lists the
/// failures. Returns the number of sites scored.
pub async fn recompute<S: SiteStore>(store: &S, weights: &Weights) -> Result<usize> {
  let rows = store
    .aggregate(OCCURRENCE_RADIUS_KM)
    .await
    .map_err(|e| Error::step(Step::Aggregate, e))?;

  let at = Utc::now();
  let scored: Vec<(SiteId, SiteScores)> = rows
    .iter()
    .map(|row| (row.site_id, SiteScores::compute(row, weights)))
    .collect();

  let results = join_all(
    scored
      .iter()
      .map(|(site_id, scores)| store.update_scores(*site_id, *scores, at)),
  )
  .await;

  let failed: Vec<(SiteId, String)> = scored
    .iter()
    .zip(results)
    .filter_map(|((site_id, _), result)| result.err().map(|e| (*site_id, e.to_string())))
    .collect();

  if !failed.is_empty() {
    for (site_id, error) in &failed {
      warn!(site_id, %error, "failed to persist site scores");
    }
    return Err(Error::Persist { attempted: scored.len(), failed });
  }

  info!(sites = scored.len(), "scores persisted");
  Ok(scored.len())
}

// ─── On-demand calculation ───────────────────────────────────────────────────

/// A site scored with caller-supplied weights. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EhiResult {
  pub id:        SiteId,
  pub name:      String,
  pub longitude: f64,
  pub latitude:  f64,
  pub ehi_score: f64,
  pub breakdown: SubScores,
  pub metadata:  SiteMetadata,
}

/// Descriptive site attributes returned alongside a calculated score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
  /// Land-cover type with the highest coverage, if any was ingested.
  pub land_cover: Option<LandCoverType>,
  pub protected:  bool,
  pub elevation:  Option<i64>,
}

impl EhiResult {
  fn from_row(row: AggregateRow, weights: &Weights) -> Self {
    let scores = SiteScores::compute(&row, weights);
    Self {
      id:        row.site_id,
      name:      row.name,
      longitude: row.longitude,
      latitude:  row.latitude,
      ehi_score: round3(scores.composite),
      breakdown: scores.sub.rounded(),
      metadata:  SiteMetadata {
        land_cover: row.dominant_land_cover,
        protected:  row.protected_area,
        elevation:  row.elevation,
      },
    }
  }
}

/// Compute composites for every site with `weights`, best first.
///
/// Weights are validated before the store is touched. Ties are broken by
/// site id.
pub async fn calculate<S: SiteStore>(store: &S, weights: PartialWeights) -> Result<Vec<EhiResult>> {
  let weights = weights.resolve()?;

  let rows = store
    .aggregate(OCCURRENCE_RADIUS_KM)
    .await
    .map_err(|e| Error::step(Step::Aggregate, e))?;

  let mut results: Vec<EhiResult> =
    rows.into_iter().map(|row| EhiResult::from_row(row, &weights)).collect();
  results.sort_by(|a, b| b.ehi_score.total_cmp(&a.ehi_score).then(a.id.cmp(&b.id)));

  Ok(results)
}
