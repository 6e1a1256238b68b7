//! Raw source datasets and their records.
//!
//! Each of the four sources owns one table that is replaced wholesale on every
//! ingestion run. Occurrences stand alone and are attached to sites spatially
//! at aggregation time; the other three are keyed to a site id.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, site::SiteId};

// ─── Source kinds ────────────────────────────────────────────────────────────

/// One of the four independently ingested datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  Occurrence,
  Climate,
  LandCover,
  HumanPressure,
}

impl SourceKind {
  /// Every source, in the order a pipeline run ingests them.
  pub const ALL: [SourceKind; 4] = [
    SourceKind::Occurrence,
    SourceKind::Climate,
    SourceKind::LandCover,
    SourceKind::HumanPressure,
  ];

  /// The name used by the request layer (`/ingest/{name}`).
  pub fn name(self) -> &'static str {
    match self {
      SourceKind::Occurrence => "gbif",
      SourceKind::Climate => "climate",
      SourceKind::LandCover => "landcover",
      SourceKind::HumanPressure => "footprint",
    }
  }

  /// Provenance tag written to the `data_source` column.
  pub fn data_source(self) -> &'static str {
    match self {
      SourceKind::Occurrence => "GBIF_Simulated",
      SourceKind::Climate => "WorldClim",
      SourceKind::LandCover => "Copernicus",
      SourceKind::HumanPressure => "SEDAC",
    }
  }
}

impl fmt::Display for SourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for SourceKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SourceKind::ALL
      .into_iter()
      .find(|k| k.name() == s)
      .ok_or_else(|| Error::UnknownSource(s.to_owned()))
  }
}

// ─── Categorical values ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandCoverType {
  Forest,
  Grassland,
  Wetland,
  Agriculture,
  Urban,
}

impl LandCoverType {
  pub const ALL: [LandCoverType; 5] = [
    LandCoverType::Forest,
    LandCoverType::Grassland,
    LandCoverType::Wetland,
    LandCoverType::Agriculture,
    LandCoverType::Urban,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      LandCoverType::Forest => "forest",
      LandCoverType::Grassland => "grassland",
      LandCoverType::Wetland => "wetland",
      LandCoverType::Agriculture => "agriculture",
      LandCoverType::Urban => "urban",
    }
  }
}

impl FromStr for LandCoverType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    LandCoverType::ALL
      .into_iter()
      .find(|t| t.as_str() == s)
      .ok_or_else(|| Error::UnknownLandCover(s.to_owned()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureType {
  Urbanization,
  Agriculture,
}

impl PressureType {
  /// Indices above one half are attributed to urbanization.
  pub fn for_index(index: f64) -> Self {
    if index > 0.5 { PressureType::Urbanization } else { PressureType::Agriculture }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PressureType::Urbanization => "urbanization",
      PressureType::Agriculture => "agriculture",
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A single species observation. Not linked to any site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
  /// Unique per record; reproducible for a given synthetic run.
  pub species_id:      String,
  pub scientific_name: String,
  pub common_name:     String,
  pub longitude:       f64,
  pub latitude:        f64,
  pub year:            i32,
  pub data_source:     String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateRecord {
  pub site_id:              SiteId,
  pub temperature_annual:   f64,
  pub precipitation_annual: f64,
  pub temperature_trend:    f64,
  pub drought_index:        f64,
  pub year:                 i32,
  pub data_source:          String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCoverRecord {
  pub site_id:             SiteId,
  pub land_cover_type:     LandCoverType,
  pub coverage_percentage: f64,
  pub year:                i32,
  pub data_source:         String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanPressureRecord {
  pub site_id:               SiteId,
  pub human_footprint_index: f64,
  pub pressure_type:         PressureType,
  pub year:                  i32,
  pub data_source:           String,
}

/// A complete replacement dataset for one source table.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRows {
  Occurrence(Vec<OccurrenceRecord>),
  Climate(Vec<ClimateRecord>),
  LandCover(Vec<LandCoverRecord>),
  HumanPressure(Vec<HumanPressureRecord>),
}

impl SourceRows {
  pub fn kind(&self) -> SourceKind {
    match self {
      SourceRows::Occurrence(_) => SourceKind::Occurrence,
      SourceRows::Climate(_) => SourceKind::Climate,
      SourceRows::LandCover(_) => SourceKind::LandCover,
      SourceRows::HumanPressure(_) => SourceKind::HumanPressure,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      SourceRows::Occurrence(rows) => rows.len(),
      SourceRows::Climate(rows) => rows.len(),
      SourceRows::LandCover(rows) => rows.len(),
      SourceRows::HumanPressure(rows) => rows.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
