//! Synthetic source ingestors.
//!
//! No live third-party service is contacted. Each generator derives its rows
//! from the current site registry plus a random source, so tests can drive
//! them with a seeded RNG.

use std::ops::Range;

use chrono::{DateTime, Utc};
use ehi_core::{
  site::Site,
  source::{
    ClimateRecord, HumanPressureRecord, LandCoverRecord, LandCoverType,
    OccurrenceRecord, PressureType, SourceKind, SourceRows,
  },
  store::SiteStore,
};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use tracing::info;

use crate::{Error, Result, Step};

/// Species drawn for every occurrence run: `(scientific, common)`.
pub const SPECIES: [(&str, &str); 5] = [
  ("Ambystoma tigrinum", "Tiger Salamander"),
  ("Gila elegans", "Colorado Pikeminnow"),
  ("Falco mexicanus", "Prairie Falcon"),
  ("Canis latrans", "Coyote"),
  ("Lepus californicus", "Black-tailed Jackrabbit"),
];

/// Observations generated per species.
pub const OCCURRENCES_PER_SPECIES: Range<usize> = 5..15;
pub const OCCURRENCE_YEARS: Range<i32> = 2020..2024;

const CLIMATE_YEAR: i32 = 2020;
const LAND_COVER_YEAR: i32 = 2022;
const HUMAN_PRESSURE_YEAR: i32 = 2020;

// ─── Site context ────────────────────────────────────────────────────────────

/// Coarse land-use context of a site, shifting its human-pressure draw.
///
/// Stands in for a real land-use classification; derived from the protected
/// flag and hints in the site name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteContext {
  Urban,
  Protected,
  Mixed,
}

impl SiteContext {
  pub fn classify(site: &Site) -> Self {
    let name = site.name.as_str();
    let has_word = |word: &str| name.split(|c: char| !c.is_alphanumeric()).any(|w| w == word);

    if name.contains("Phoenix") || has_word("Urban") {
      SiteContext::Urban
    } else if site.protected_area
      || has_word("NP")
      || name.contains("National Park")
      || name.contains("Canyon")
    {
      SiteContext::Protected
    } else {
      SiteContext::Mixed
    }
  }

  /// Range the human-footprint index is drawn from.
  pub fn pressure_range(self) -> Range<f64> {
    match self {
      SiteContext::Urban => 0.7..1.0,
      SiteContext::Protected => 0.0..0.2,
      SiteContext::Mixed => 0.1..0.4,
    }
  }
}

// ─── Generators ──────────────────────────────────────────────────────────────

/// Generate a full replacement dataset for `kind`.
///
/// `now` stamps occurrence ids so ids from different runs never collide.
pub fn generate<R: Rng + ?Sized>(
  kind:  SourceKind,
  sites: &[Site],
  rng:   &mut R,
  now:   DateTime<Utc>,
) -> SourceRows {
  match kind {
    SourceKind::Occurrence => SourceRows::Occurrence(occurrences(sites, rng, now)),
    SourceKind::Climate => SourceRows::Climate(climate(sites, rng)),
    SourceKind::LandCover => SourceRows::LandCover(land_cover(sites, rng)),
    SourceKind::HumanPressure => SourceRows::HumanPressure(human_pressure(sites, rng)),
  }
}

/// Each species gets a random number of observations, each placed at a
/// randomly chosen site.
pub fn occurrences<R: Rng + ?Sized>(
  sites: &[Site],
  rng:   &mut R,
  now:   DateTime<Utc>,
) -> Vec<OccurrenceRecord> {
  if sites.is_empty() {
    return Vec::new();
  }

  let stamp = now.timestamp_millis();
  let mut rows = Vec::new();

  for (scientific, common) in SPECIES {
    let count = rng.random_range(OCCURRENCES_PER_SPECIES);
    for seq in 0..count {
      let Some(site) = sites.choose(rng) else { continue };
      rows.push(OccurrenceRecord {
        species_id:      format!("sim_{}_{seq}_{stamp}", scientific.replace(' ', "_")),
        scientific_name: scientific.to_owned(),
        common_name:     common.to_owned(),
        longitude:       site.longitude,
        latitude:        site.latitude,
        year:            rng.random_range(OCCURRENCE_YEARS),
        data_source:     SourceKind::Occurrence.data_source().to_owned(),
      });
    }
  }

  rows
}

/// Temperature falls with latitude and precipitation rises eastward; trend
/// and drought are random.
pub fn climate<R: Rng + ?Sized>(sites: &[Site], rng: &mut R) -> Vec<ClimateRecord> {
  sites
    .iter()
    .map(|site| ClimateRecord {
      site_id:              site.id,
      temperature_annual:   15.0 + (site.latitude - 40.0) * -0.6,
      precipitation_annual: 800.0 + (site.longitude + 100.0) * 10.0,
      temperature_trend:    rng.random_range(-0.04..0.04),
      drought_index:        rng.random_range(0.1..0.9),
      year:                 CLIMATE_YEAR,
      data_source:          SourceKind::Climate.data_source().to_owned(),
    })
    .collect()
}

pub fn land_cover<R: Rng + ?Sized>(sites: &[Site], rng: &mut R) -> Vec<LandCoverRecord> {
  sites
    .iter()
    .map(|site| LandCoverRecord {
      site_id:             site.id,
      land_cover_type:     LandCoverType::ALL[rng.random_range(0..LandCoverType::ALL.len())],
      coverage_percentage: rng.random_range(20.0..100.0),
      year:                LAND_COVER_YEAR,
      data_source:         SourceKind::LandCover.data_source().to_owned(),
    })
    .collect()
}

pub fn human_pressure<R: Rng + ?Sized>(sites: &[Site], rng: &mut R) -> Vec<HumanPressureRecord> {
  sites
    .iter()
    .map(|site| {
      let index = rng.random_range(SiteContext::classify(site).pressure_range());
      HumanPressureRecord {
        site_id:               site.id,
        human_footprint_index: index,
        pressure_type:         PressureType::for_index(index),
        year:                  HUMAN_PRESSURE_YEAR,
        data_source:           SourceKind::HumanPressure.data_source().to_owned(),
      }
    })
    .collect()
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// Regenerate one source from the current registry and replace its table.
///
/// Returns the number of rows written. A failed write leaves the table as the
/// store left it; see [`SiteStore::replace_all`].
pub async fn ingest<S: SiteStore>(store: &S, kind: SourceKind) -> Result<usize> {
  let step = Step::Ingest(kind);

  let sites = store.list_sites().await.map_err(|e| Error::step(step, e))?;
  let rows = generate(kind, &sites, &mut StdRng::from_os_rng(), Utc::now());

  info!(source = %kind, sites = sites.len(), rows = rows.len(), "replacing source table");
  let written = store.replace_all(rows).await.map_err(|e| Error::step(step, e))?;
  info!(source = %kind, rows = written, "ingest complete");

  Ok(written)
}
