//! The two automatic triggers: a one-shot run shortly after startup and a
//! recurring daily run.
//!
//! Both call [`Pipeline::run_full`] and coordinate only through its run lock.
//! Their failures are logged and dropped; nothing awaits them.

use std::{sync::Arc, time::Duration};

use ehi_core::store::SiteStore;
use ehi_pipeline::{Error, Pipeline, Trigger};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

/// Run the full pipeline for `trigger`, logging the outcome.
pub async fn run_logged<S: SiteStore + 'static>(pipeline: &Pipeline<S>, trigger: Trigger) {
  info!(?trigger, "automatic pipeline run starting");
  match pipeline.run_full(trigger).await {
    Ok(report) => info!(?trigger, sites = report.sites_scored, "automatic pipeline run completed"),
    Err(Error::AlreadyRunning) => warn!(?trigger, "skipped: a pipeline run is already in progress"),
    Err(e) => error!(?trigger, error = %e, "automatic pipeline run failed"),
  }
}

/// Spawn the one-shot startup run after `delay`.
pub fn spawn_startup_run<S: SiteStore + 'static>(
  pipeline: Arc<Pipeline<S>>,
  delay:    Duration,
) -> JoinHandle<()> {
  info!(?delay, "startup run scheduled");
  tokio::spawn(async move {
    tokio::time::sleep(delay).await;
    run_logged(&pipeline, Trigger::Startup).await;
  })
}

/// A job running the full pipeline on `cron` (six fields, UTC).
pub fn daily_job<S: SiteStore + 'static>(
  pipeline: Arc<Pipeline<S>>,
  cron:     &str,
) -> Result<Job, JobSchedulerError> {
  Job::new_async(cron, move |_uuid, _l| {
    let pipeline = pipeline.clone();
    Box::pin(async move {
      run_logged(&pipeline, Trigger::Scheduled).await;
    })
  })
}

/// Create and start a scheduler holding the daily job.
///
/// The returned scheduler must be kept alive for the job to keep firing.
pub async fn start_daily<S: SiteStore + 'static>(
  pipeline: Arc<Pipeline<S>>,
  cron:     &str,
) -> Result<JobScheduler, JobSchedulerError> {
  let sched = JobScheduler::new().await?;
  sched.add(daily_job(pipeline, cron)?).await?;
  sched.start().await?;
  info!(cron, "daily pipeline schedule started");
  Ok(sched)
}
