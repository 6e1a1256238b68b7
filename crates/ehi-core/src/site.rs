//! Monitoring sites, the fixed registry the pipeline scores.
//!
//! A site's identity and location never change once registered. Only the
//! scoring block is rewritten, and only by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer identity of a monitoring site.
pub type SiteId = i64;

/// The persisted scoring block of a site.
///
/// Either all five scores and the timestamp are present or the site has never
/// been scored; [`Site::scores`] is `None` in the latter case. There is no way
/// to represent a partially scored site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBlock {
  pub biodiversity_score:   f64,
  pub climate_score:        f64,
  pub human_pressure_score: f64,
  pub vegetation_score:     f64,
  pub composite_ehi:        f64,
  pub last_calculated:      DateTime<Utc>,
}

/// A registered monitoring site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
  pub id:             SiteId,
  pub name:           String,
  pub longitude:      f64,
  pub latitude:       f64,
  pub elevation:      Option<i64>,
  pub protected_area: bool,
  pub scores:         Option<ScoreBlock>,
}

impl Site {
  /// WKT rendering of the site position, as stored in the `position` column.
  pub fn position_wkt(&self) -> String { point_wkt(self.longitude, self.latitude) }
}

/// Input for registering a site. Ids are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSite {
  pub name:           String,
  pub longitude:      f64,
  pub latitude:       f64,
  #[serde(default)]
  pub elevation:      Option<i64>,
  #[serde(default)]
  pub protected_area: bool,
}

impl NewSite {
  pub fn new(name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
    Self {
      name: name.into(),
      longitude,
      latitude,
      elevation: None,
      protected_area: false,
    }
  }

  pub fn protected(mut self) -> Self {
    self.protected_area = true;
    self
  }
}

/// `POINT(lon lat)` in WKT, longitude first.
pub fn point_wkt(longitude: f64, latitude: f64) -> String {
  format!("POINT({longitude} {latitude})")
}
