//! The per-site aggregate row consumed by the scorer.

use serde::{Deserialize, Serialize};

use crate::{site::SiteId, source::LandCoverType};

/// One site joined against all four source tables.
///
/// Never stored: built fresh for every scoring pass. A `None` field means the
/// source had nothing to say about this site, which the scorer treats as
/// neutral rather than as the worst case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
  pub site_id:                  SiteId,
  pub name:                     String,
  pub longitude:                f64,
  pub latitude:                 f64,
  pub elevation:                Option<i64>,
  pub protected_area:           bool,
  /// Distinct occurrences within the proximity radius. `None` only when the
  /// occurrence table is empty altogether.
  pub occurrence_count:         Option<u32>,
  pub avg_temperature_annual:   Option<f64>,
  pub avg_precipitation_annual: Option<f64>,
  pub avg_temperature_trend:    Option<f64>,
  pub avg_drought_index:        Option<f64>,
  /// Strongest land-cover coverage among the site's rows (a maximum, not an
  /// average).
  pub max_coverage_percentage:  Option<f64>,
  /// Land-cover type of the row holding that maximum.
  pub dominant_land_cover:      Option<LandCoverType>,
  pub avg_human_pressure:       Option<f64>,
}

impl AggregateRow {
  /// A row with no source data at all.
  pub fn empty(site_id: SiteId, name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
    Self {
      site_id,
      name: name.into(),
      longitude,
      latitude,
      elevation: None,
      protected_area: false,
      occurrence_count: None,
      avg_temperature_annual: None,
      avg_precipitation_annual: None,
      avg_temperature_trend: None,
      avg_drought_index: None,
      max_coverage_percentage: None,
      dominant_land_cover: None,
      avg_human_pressure: None,
    }
  }
}
