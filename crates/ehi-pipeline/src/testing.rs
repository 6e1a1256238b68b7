//! A [`SiteStore`] wrapper for exercising the orchestrator.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Utc};
use ehi_core::{
  aggregate::AggregateRow,
  scoring::SiteScores,
  site::{NewSite, Site, SiteId},
  source::{SourceKind, SourceRows},
  store::{SiteStore, StoreStatus},
};
use ehi_store_sqlite::SqliteStore;
use tokio::sync::Notify;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
  #[error(transparent)]
  Store(#[from] ehi_store_sqlite::Error),
  #[error("injected failure replacing {0}")]
  Injected(SourceKind),
  #[error("injected failure updating site {0}")]
  InjectedUpdate(SiteId),
}

/// Holds the occurrence replace open until released.
#[derive(Default)]
pub struct Gate {
  pub entered: Notify,
  pub release: Notify,
}

/// In-memory SQLite store with a gate, injected failures and a call counter.
pub struct ProbeStore {
  inner:               SqliteStore,
  gate:                Option<Arc<Gate>>,
  fail_on:             Option<SourceKind>,
  fail_update:         Option<SiteId>,
  pub aggregate_calls: AtomicUsize,
}

impl ProbeStore {
  pub async fn new() -> Self {
    Self {
      inner:           SqliteStore::open_in_memory().await.expect("in-memory store"),
      gate:            None,
      fail_on:         None,
      fail_update:     None,
      aggregate_calls: AtomicUsize::new(0),
    }
  }

  pub fn gated(mut self, gate: Arc<Gate>) -> Self {
    self.gate = Some(gate);
    self
  }

  pub fn failing_on(mut self, kind: SourceKind) -> Self {
    self.fail_on = Some(kind);
    self
  }

  pub fn failing_update(mut self, site_id: SiteId) -> Self {
    self.fail_update = Some(site_id);
    self
  }
}

impl SiteStore for ProbeStore {
  type Error = ProbeError;

  async fn add_site(&self, site: NewSite) -> Result<Site, ProbeError> {
    Ok(self.inner.add_site(site).await?)
  }

  async fn list_sites(&self) -> Result<Vec<Site>, ProbeError> {
    Ok(self.inner.list_sites().await?)
  }

  async fn replace_all(&self, rows: SourceRows) -> Result<usize, ProbeError> {
    let kind = rows.kind();
    if self.fail_on == Some(kind) {
      return Err(ProbeError::Injected(kind));
    }
    if let (Some(gate), SourceKind::Occurrence) = (&self.gate, kind) {
      gate.entered.notify_one();
      gate.release.notified().await;
    }
    Ok(self.inner.replace_all(rows).await?)
  }

  async fn aggregate(&self, radius_km: f64) -> Result<Vec<AggregateRow>, ProbeError> {
    self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.inner.aggregate(radius_km).await?)
  }

  async fn update_scores(
    &self,
    site_id: SiteId,
    scores: SiteScores,
    at: DateTime<Utc>,
  ) -> Result<(), ProbeError> {
    if self.fail_update == Some(site_id) {
      return Err(ProbeError::InjectedUpdate(site_id));
    }
    Ok(self.inner.update_scores(site_id, scores, at).await?)
  }

  async fn status(&self) -> Result<StoreStatus, ProbeError> {
    Ok(self.inner.status().await?)
  }
}
