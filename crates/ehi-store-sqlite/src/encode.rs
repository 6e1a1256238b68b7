//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Booleans are stored as
//! `0`/`1` integers. Categorical values use their lowercase names.

use chrono::{DateTime, Utc};
use ehi_core::{
  site::{ScoreBlock, Site},
  source::SourceKind,
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SourceKind
// ───────────────────────────────────────────────────────────────

/// Table holding the rows of each source.
pub fn source_table(kind: SourceKind) -> &'static str {
  match kind {
    SourceKind::Occurrence => "occurrence",
    SourceKind::Climate => "climate",
    SourceKind::LandCover => "land_cover",
    SourceKind::HumanPressure => "human_pressure",
  }
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Column-for-column image of a `sites` row before decoding.
pub struct RawSite {
  pub id:                   i64,
  pub name:                 String,
  pub longitude:            f64,
  pub latitude:             f64,
  pub elevation:            Option<i64>,
  pub protected_area:       bool,
  pub biodiversity_score:   Option<f64>,
  pub climate_score:        Option<f64>,
  pub human_pressure_score: Option<f64>,
  pub vegetation_score:     Option<f64>,
  pub composite_ehi:        Option<f64>,
  pub last_calculated:      Option<String>,
}

/// Column list matching [`RawSite::from_row`].
pub const SITE_COLUMNS: &str = "id, name, longitude, latitude, elevation, protected_area,
  biodiversity_score, climate_score, human_pressure_score, vegetation_score,
  composite_ehi, last_calculated";

impl RawSite {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      name:                 row.get(1)?,
      longitude:            row.get(2)?,
      latitude:             row.get(3)?,
      elevation:            row.get(4)?,
      protected_area:       row.get(5)?,
      biodiversity_score:   row.get(6)?,
      climate_score:        row.get(7)?,
      human_pressure_score: row.get(8)?,
      vegetation_score:     row.get(9)?,
      composite_ehi:        row.get(10)?,
      last_calculated:      row.get(11)?,
    })
  }

  pub fn into_site(self) -> Result<Site> {
    let scores = match (
      self.biodiversity_score,
      self.climate_score,
      self.human_pressure_score,
      self.vegetation_score,
      self.composite_ehi,
      self.last_calculated,
    ) {
      (Some(b), Some(c), Some(h), Some(v), Some(e), Some(at)) => Some(ScoreBlock {
        biodiversity_score:   b,
        climate_score:        c,
        human_pressure_score: h,
        vegetation_score:     v,
        composite_ehi:        e,
        last_calculated:      decode_dt(&at)?,
      }),
      (None, None, None, None, None, None) => None,
      _ => return Err(Error::InconsistentScores(self.id)),
    };

    Ok(Site {
      id: self.id,
      name: self.name,
      longitude: self.longitude,
      latitude: self.latitude,
      elevation: self.elevation,
      protected_area: self.protected_area,
      scores,
    })
  }
}
