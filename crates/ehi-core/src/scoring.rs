//! Normalization of raw aggregates onto [0, 1] and the weighted composite.
//!
//! Sub-scores are computed from an [`AggregateRow`]:
//!
//! | Sub-score      | Input                      | Range    |
//! |----------------|----------------------------|----------|
//! | biodiversity   | occurrence count           | 0 – 50   |
//! | climate        | `1 - \|temperature trend\|`| 0 – 1    |
//! | human pressure | `1 - pressure index`       | 0 – 1    |
//! | vegetation     | max land-cover coverage    | 0 – 100  |
//!
//! Missing inputs score a neutral 0.5.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, aggregate::AggregateRow};

/// Score given to an input the sources did not provide.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Allowed deviation of a weight set's sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

const MAX_OCCURRENCES: f64 = 50.0;
const MAX_COVERAGE: f64 = 100.0;

/// Map `value` linearly from `[min, max]` onto `[0, 1]`, clamping outside the
/// range. An absent value yields [`NEUTRAL_SCORE`].
///
/// Requires `min < max`.
pub fn normalize(value: Option<f64>, min: f64, max: f64) -> f64 {
  match value {
    None => NEUTRAL_SCORE,
    Some(v) => ((v - min) / (max - min)).clamp(0.0, 1.0),
  }
}

/// Round to three decimals, for values reported to callers.
pub fn round3(value: f64) -> f64 { (value * 1000.0).round() / 1000.0 }

// ─── Weights ─────────────────────────────────────────────────────────────────

/// Relative importance of each sub-score in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
  pub biodiversity:   f64,
  pub climate:        f64,
  pub human_pressure: f64,
  pub vegetation:     f64,
}

impl Weights {
  pub const DEFAULT: Weights = Weights {
    biodiversity:   0.30,
    climate:        0.25,
    human_pressure: 0.25,
    vegetation:     0.20,
  };

  pub fn sum(&self) -> f64 {
    self.biodiversity + self.climate + self.human_pressure + self.vegetation
  }

  /// Check that each weight lies in `[0, 1]` and that they sum to 1.0 within
  /// [`WEIGHT_TOLERANCE`]. Invalid sets are rejected, never renormalized.
  pub fn validate(self) -> Result<Self> {
    for (name, value) in [
      ("biodiversity", self.biodiversity),
      ("climate", self.climate),
      ("humanPressure", self.human_pressure),
      ("vegetation", self.vegetation),
    ] {
      if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::WeightOutOfRange { name, value });
      }
    }

    let sum = self.sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(Error::WeightSum { sum, tolerance: WEIGHT_TOLERANCE });
    }
    Ok(self)
  }
}

impl Default for Weights {
  fn default() -> Self { Self::DEFAULT }
}

/// Caller-supplied weights where any field may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialWeights {
  pub biodiversity:   Option<f64>,
  pub climate:        Option<f64>,
  pub human_pressure: Option<f64>,
  pub vegetation:     Option<f64>,
}

impl PartialWeights {
  /// Fill omitted fields from [`Weights::DEFAULT`] and validate the result.
  pub fn resolve(self) -> Result<Weights> {
    let d = Weights::DEFAULT;
    Weights {
      biodiversity:   self.biodiversity.unwrap_or(d.biodiversity),
      climate:        self.climate.unwrap_or(d.climate),
      human_pressure: self.human_pressure.unwrap_or(d.human_pressure),
      vegetation:     self.vegetation.unwrap_or(d.vegetation),
    }
    .validate()
  }
}

// ─── Sub-scores ──────────────────────────────────────────────────────────────

/// The four normalized component scores of a site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
  pub biodiversity:   f64,
  pub climate:        f64,
  pub human_pressure: f64,
  pub vegetation:     f64,
}

impl SubScores {
  pub fn from_aggregate(row: &AggregateRow) -> Self {
    Self {
      biodiversity:   normalize(row.occurrence_count.map(f64::from), 0.0, MAX_OCCURRENCES),
      // A flatter temperature trend means a more stable climate.
      climate:        normalize(row.avg_temperature_trend.map(|t| 1.0 - t.abs()), 0.0, 1.0),
      human_pressure: normalize(row.avg_human_pressure.map(|p| 1.0 - p), 0.0, 1.0),
      vegetation:     normalize(row.max_coverage_percentage, 0.0, MAX_COVERAGE),
    }
  }

  /// Weighted sum of the sub-scores. Unrounded.
  pub fn composite(&self, weights: &Weights) -> f64 {
    self.biodiversity * weights.biodiversity
      + self.climate * weights.climate
      + self.human_pressure * weights.human_pressure
      + self.vegetation * weights.vegetation
  }

  pub fn rounded(&self) -> Self {
    Self {
      biodiversity:   round3(self.biodiversity),
      climate:        round3(self.climate),
      human_pressure: round3(self.human_pressure),
      vegetation:     round3(self.vegetation),
    }
  }
}

/// Sub-scores and composite for one site, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteScores {
  pub sub:       SubScores,
  pub composite: f64,
}

impl SiteScores {
  pub fn compute(row: &AggregateRow, weights: &Weights) -> Self {
    let sub = SubScores::from_aggregate(row);
    Self { composite: sub.composite(weights), sub }
  }
}
