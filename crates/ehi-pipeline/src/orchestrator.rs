//! [`Pipeline`] sequences ingestion and scoring under a single-run lock.
//!
//! Every trigger (startup, the daily schedule, a manual request) calls into
//! the same entry points. They coordinate only through the lock: a start
//! attempt while another run holds it fails with [`Error::AlreadyRunning`]
//! instead of queueing.

use std::{
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use ehi_core::{
  scoring::{PartialWeights, Weights},
  source::SourceKind,
  store::{SiteStore, StoreStatus},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
  Error, Result, Step, ingest,
  score::{self, EhiResult},
};

// ─── Run descriptions ────────────────────────────────────────────────────────

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
  Startup,
  Scheduled,
  Manual,
}

/// Which steps a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "source", rename_all = "snake_case")]
pub enum RunKind {
  /// All four sources, then scoring.
  Full,
  /// One source, then scoring.
  Single(SourceKind),
  /// Scoring only.
  Recompute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCount {
  pub source: SourceKind,
  pub rows:   usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub ingested:     Vec<IngestCount>,
  pub sites_scored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
  Completed { report: RunReport },
  Failed {
    /// `None` when the run stopped outside any step.
    step:  Option<Step>,
    error: String,
  },
}

/// The most recent finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id:      Uuid,
  pub kind:        RunKind,
  pub trigger:     Trigger,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  #[serde(flatten)]
  pub outcome:     RunOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
  Idle,
  Running {
    run_id:     Uuid,
    kind:       RunKind,
    trigger:    Trigger,
    started_at: DateTime<Utc>,
  },
}

/// Store counts plus the run state, as reported by `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatus {
  #[serde(flatten)]
  pub store:    StoreStatus,
  pub pipeline: RunState,
  pub last_run: Option<RunRecord>,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RunBook {
  current:  Option<RunState>,
  last_run: Option<RunRecord>,
}

pub struct Pipeline<S> {
  store:    Arc<S>,
  weights:  Weights,
  run_lock: tokio::sync::Mutex<()>,
  book:     Mutex<RunBook>,
}

impl<S: SiteStore> Pipeline<S> {
  /// A pipeline persisting composites computed with `weights`.
  pub fn new(store: Arc<S>, weights: Weights) -> Result<Self> {
    Ok(Self {
      store,
      weights: weights.validate()?,
      run_lock: tokio::sync::Mutex::new(()),
      book: Mutex::new(RunBook::default()),
    })
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn weights(&self) -> Weights { self.weights }

  /// Ingest every source in order, then score and persist all sites.
  ///
  /// A failing step ends the run; later steps do not execute.
  pub async fn run_full(&self, trigger: Trigger) -> Result<RunReport> {
    self
      .execute(RunKind::Full, trigger, async {
        let mut report = RunReport::default();
        for kind in SourceKind::ALL {
          let rows = ingest::ingest(self.store.as_ref(), kind).await?;
          report.ingested.push(IngestCount { source: kind, rows });
        }
        report.sites_scored = score::recompute(self.store.as_ref(), &self.weights).await?;
        Ok(report)
      })
      .await
  }

  /// Re-ingest one source, then rescore.
  pub async fn ingest_source(&self, kind: SourceKind, trigger: Trigger) -> Result<RunReport> {
    self
      .execute(RunKind::Single(kind), trigger, async {
        let rows = ingest::ingest(self.store.as_ref(), kind).await?;
        let sites_scored = score::recompute(self.store.as_ref(), &self.weights).await?;
        Ok(RunReport { ingested: vec![IngestCount { source: kind, rows }], sites_scored })
      })
      .await
  }

  /// Rescore from the current source tables without ingesting.
  pub async fn recompute(&self, trigger: Trigger) -> Result<RunReport> {
    self
      .execute(RunKind::Recompute, trigger, async {
        let sites_scored = score::recompute(self.store.as_ref(), &self.weights).await?;
        Ok(RunReport { ingested: Vec::new(), sites_scored })
      })
      .await
  }

  /// Score every site with caller weights. Read-only, so it does not take
  /// the run lock.
  pub async fn calculate_ehi(&self, weights: PartialWeights) -> Result<Vec<EhiResult>> {
    score::calculate(self.store.as_ref(), weights).await
  }

  pub async fn status(&self) -> Result<PipelineStatus> {
    let store = self
      .store
      .status()
      .await
      .map_err(Error::store)?;

    let book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(PipelineStatus {
      store,
      pipeline: book.current.clone().unwrap_or(RunState::Idle),
      last_run: book.last_run.clone(),
    })
  }

  /// Whether a run is in progress. Reads the run book, never the lock.
  pub fn is_running(&self) -> bool {
    self.book.lock().unwrap_or_else(PoisonError::into_inner).current.is_some()
  }

  async fn execute(
    &self,
    kind: RunKind,
    trigger: Trigger,
    steps: impl Future<Output = Result<RunReport>>,
  ) -> Result<RunReport> {
    let Ok(_lock) = self.run_lock.try_lock() else {
      info!(?kind, ?trigger, "run rejected: another run is in progress");
      return Err(Error::AlreadyRunning);
    };

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let _running = Running::enter(&self.book, RunState::Running { run_id, kind, trigger, started_at });
    info!(%run_id, ?kind, ?trigger, "pipeline run started");

    let result = steps.await;

    let outcome = match &result {
      Ok(report) => {
        info!(%run_id, sites = report.sites_scored, "pipeline run completed");
        RunOutcome::Completed { report: report.clone() }
      }
      Err(e) => {
        let step = e.failed_step();
        error!(%run_id, step = ?step, error = %e, "pipeline run failed");
        RunOutcome::Failed { step, error: e.to_string() }
      }
    };

    let record = RunRecord { run_id, kind, trigger, started_at, finished_at: Utc::now(), outcome };
    self.book.lock().unwrap_or_else(PoisonError::into_inner).last_run = Some(record);

    result
  }
}

/// Marks the run book as running until dropped, so a cancelled or panicking
/// run still returns the pipeline to idle.
struct Running<'a> {
  book: &'a Mutex<RunBook>,
}

impl<'a> Running<'a> {
  fn enter(book: &'a Mutex<RunBook>, state: RunState) -> Self {
    book.lock().unwrap_or_else(PoisonError::into_inner).current = Some(state);
    Self { book }
  }
}

impl Drop for Running<'_> {
  fn drop(&mut self) {
    self.book.lock().unwrap_or_else(PoisonError::into_inner).current = None;
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use ehi_core::site::NewSite;

  use super::*;
  use crate::testing::{Gate, ProbeStore};

  async fn seeded(store: ProbeStore) -> Arc<ProbeStore> {
    for site in [
      NewSite::new("Rocky Mountain NP", -105.68, 40.34).protected(),
      NewSite::new("Phoenix Urban", -112.07, 33.45),
      NewSite::new("Kansas Prairie", -99.5, 38.9),
    ] {
      store.add_site(site).await.unwrap();
    }
    Arc::new(store)
  }

  fn pipeline(store: Arc<ProbeStore>) -> Arc<Pipeline<ProbeStore>> {
    Arc::new(Pipeline::new(store, Weights::DEFAULT).unwrap())
  }

  #[tokio::test]
  async fn full_run_ingests_everything_and_scores_all_sites() {
    let p = pipeline(seeded(ProbeStore::new().await).await);

    let report = p.run_full(Trigger::Manual).await.unwrap();
    let sources: Vec<_> = report.ingested.iter().map(|c| c.source).collect();
    assert_eq!(sources, SourceKind::ALL);
    assert_eq!(report.sites_scored, 3);

    let sites = p.store().list_sites().await.unwrap();
    for site in sites {
      let block = site.scores.expect("every site scored");
      assert!((0.0..=1.0).contains(&block.composite_ehi));
    }

    let status = p.status().await.unwrap();
    assert_eq!(status.pipeline, RunState::Idle);
    assert_eq!(status.store.counts.climate, 3);
    let last = status.last_run.expect("run recorded");
    assert_eq!(last.trigger, Trigger::Manual);
    assert!(matches!(last.outcome, RunOutcome::Completed { .. }));
  }

  #[tokio::test]
  async fn consecutive_runs_replace_rather_than_append() {
    let p = pipeline(seeded(ProbeStore::new().await).await);

    p.run_full(Trigger::Manual).await.unwrap();
    let first = p.status().await.unwrap().store.counts;
    p.run_full(Trigger::Manual).await.unwrap();
    let second = p.status().await.unwrap().store.counts;

    assert_eq!(first.sites, second.sites);
    assert_eq!(first.climate, second.climate);
    assert_eq!(first.land_cover, second.land_cover);
    assert_eq!(first.human_pressure, second.human_pressure);
    assert_eq!(second.climate, 3);
    // Occurrence volume is random per run but never accumulates.
    assert!(second.occurrence >= 25 && second.occurrence < 75);
  }

  #[tokio::test]
  async fn second_trigger_during_a_run_is_rejected() {
    let gate = Arc::new(Gate::default());
    let store = seeded(ProbeStore::new().await.gated(gate.clone())).await;
    let p = pipeline(store);

    let first = tokio::spawn({
      let p = p.clone();
      async move { p.run_full(Trigger::Startup).await }
    });
    gate.entered.notified().await;

    assert!(p.is_running());
    let status = p.status().await.unwrap();
    assert!(matches!(status.pipeline, RunState::Running { trigger: Trigger::Startup, .. }));

    for attempt in [
      p.run_full(Trigger::Scheduled).await,
      p.recompute(Trigger::Manual).await,
      p.ingest_source(SourceKind::Climate, Trigger::Manual).await,
    ] {
      assert!(matches!(attempt, Err(Error::AlreadyRunning)));
    }

    gate.release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.sites_scored, 3);

    let last = p.status().await.unwrap().last_run.unwrap();
    assert_eq!(last.trigger, Trigger::Startup);
    assert!(!p.is_running());
  }

  #[tokio::test]
  async fn failing_step_skips_later_steps() {
    let store = seeded(ProbeStore::new().await.failing_on(SourceKind::LandCover)).await;
    let p = pipeline(store.clone());

    let err = p.run_full(Trigger::Scheduled).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::Ingest(SourceKind::LandCover)));

    let counts = p.status().await.unwrap().store.counts;
    assert!(counts.occurrence > 0);
    assert_eq!(counts.climate, 3);
    assert_eq!(counts.human_pressure, 0);
    assert_eq!(store.aggregate_calls.load(Ordering::SeqCst), 0);
    assert!(store.list_sites().await.unwrap().iter().all(|s| s.scores.is_none()));

    let last = p.status().await.unwrap().last_run.unwrap();
    assert!(matches!(
      last.outcome,
      RunOutcome::Failed { step: Some(Step::Ingest(SourceKind::LandCover)), .. }
    ));

    // The lock is released after a failure.
    assert!(p.recompute(Trigger::Manual).await.is_ok());
  }

  #[tokio::test]
  async fn failed_score_update_does_not_block_other_sites() {
    // Seeded sites get ids 1, 2 and 3.
    let unscored = 2;
    let store = seeded(ProbeStore::new().await.failing_update(unscored)).await;
    let p = pipeline(store.clone());

    let err = p.run_full(Trigger::Manual).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::Persist));
    let Error::Persist { attempted, failed } = &err else {
      panic!("expected a persist error, got {err}");
    };
    assert_eq!(*attempted, 3);
    assert_eq!(failed.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![unscored]);

    for site in store.list_sites().await.unwrap() {
      assert_eq!(site.scores.is_some(), site.id != unscored, "site {}", site.id);
    }

    let last = p.status().await.unwrap().last_run.unwrap();
    assert!(matches!(last.outcome, RunOutcome::Failed { step: Some(Step::Persist), .. }));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn polling_is_running_never_rejects_a_start() {
    let p = pipeline(seeded(ProbeStore::new().await).await);
    assert!(!p.is_running());

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let poller = std::thread::spawn({
      let (p, stop) = (p.clone(), stop.clone());
      move || {
        while !stop.load(Ordering::Relaxed) {
          std::hint::black_box(p.is_running());
        }
      }
    });

    for _ in 0..20 {
      p.recompute(Trigger::Manual).await.unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    poller.join().unwrap();
    assert!(!p.is_running());
  }

  #[tokio::test]
  async fn single_source_ingest_rescores() {
    let p = pipeline(seeded(ProbeStore::new().await).await);

    let report = p.ingest_source(SourceKind::HumanPressure, Trigger::Manual).await.unwrap();
    assert_eq!(report.ingested, vec![IngestCount { source: SourceKind::HumanPressure, rows: 3 }]);
    assert_eq!(report.sites_scored, 3);
  }

  #[tokio::test]
  async fn invalid_weights_never_touch_the_store() {
    let store = seeded(ProbeStore::new().await).await;
    let p = pipeline(store.clone());

    let weights = PartialWeights {
      biodiversity:   Some(0.2),
      climate:        Some(0.2),
      human_pressure: Some(0.2),
      vegetation:     Some(0.2),
    };
    let err = p.calculate_ehi(weights).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ehi_core::Error::WeightSum { .. })));
    assert_eq!(store.aggregate_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn calculate_returns_sorted_results_without_persisting() {
    let p = pipeline(seeded(ProbeStore::new().await).await);
    p.run_full(Trigger::Manual).await.unwrap();
    let before = p.store().list_sites().await.unwrap();

    let weights = PartialWeights { biodiversity: Some(0.1), vegetation: Some(0.4), ..Default::default() };
    let results = p.calculate_ehi(weights).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.windows(2).all(|w| w[0].ehi_score >= w[1].ehi_score));
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.ehi_score)));
    assert_eq!(p.store().list_sites().await.unwrap(), before);

    let rocky = results.iter().find(|r| r.name == "Rocky Mountain NP").unwrap();
    assert!(rocky.metadata.protected);
    assert!(rocky.metadata.land_cover.is_some());
    assert_eq!(rocky.metadata.elevation, None);
    let phoenix = results.iter().find(|r| r.name == "Phoenix Urban").unwrap();
    assert!(!phoenix.metadata.protected);
  }

  #[tokio::test]
  async fn pipeline_rejects_invalid_default_weights() {
    let weights = Weights { biodiversity: 0.5, climate: 0.5, human_pressure: 0.5, vegetation: 0.5 };
    let store = Arc::new(ProbeStore::new().await);
    assert!(matches!(Pipeline::new(store, weights), Err(Error::Validation(_))));
  }
}
