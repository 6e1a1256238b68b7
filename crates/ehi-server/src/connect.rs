//! Opening the store, retried with exponential backoff.
//!
//! Only the initial connection is retried; once the server is up, store
//! errors fail the request or run that hit them.

use std::{fmt::Display, future::Future, path::Path, time::Duration};

use ehi_store_sqlite::SqliteStore;
use tracing::{info, warn};

/// Longest wait between two attempts.
const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub attempts:   u32,
  /// Wait after the first failure; doubled after each further one.
  pub base_delay: Duration,
}

impl RetryPolicy {
  pub fn delay_after(&self, failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(failures.saturating_sub(1));
    self.base_delay.saturating_mul(factor).min(MAX_DELAY)
  }
}

/// Run `op` until it succeeds or `policy.attempts` is exhausted, returning
/// the last error in the latter case.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: Display,
{
  let attempts = policy.attempts.max(1);
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(e) if attempt >= attempts => return Err(e),
      Err(e) => {
        let delay = policy.delay_after(attempt);
        warn!(attempt, attempts, error = %e, ?delay, "store connection failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
    }
  }
}

/// Open the SQLite store at `path` under `policy`.
pub async fn open_store(path: &Path, policy: RetryPolicy) -> ehi_store_sqlite::Result<SqliteStore> {
  let store = with_retry(policy, || SqliteStore::open(path)).await?;
  info!(path = %path.display(), "store opened");
  Ok(store)
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn policy(attempts: u32) -> RetryPolicy {
    RetryPolicy { attempts, base_delay: Duration::from_millis(1) }
  }

  #[test]
  fn delay_doubles_up_to_the_cap() {
    let p = RetryPolicy { attempts: 10, base_delay: Duration::from_secs(3) };
    assert_eq!(p.delay_after(1), Duration::from_secs(3));
    assert_eq!(p.delay_after(2), Duration::from_secs(6));
    assert_eq!(p.delay_after(3), Duration::from_secs(12));
    assert_eq!(p.delay_after(9), MAX_DELAY);
  }

  #[tokio::test]
  async fn succeeds_after_transient_failures() {
    let calls = &AtomicU32::new(0);
    let result: Result<u32, String> = with_retry(policy(5), move || async move {
      let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
      if n < 3 { Err(format!("attempt {n} refused")) } else { Ok(n) }
    })
    .await;
    assert_eq!(result, Ok(3));
  }

  #[tokio::test]
  async fn gives_up_after_the_last_attempt() {
    let calls = &AtomicU32::new(0);
    let result: Result<(), String> = with_retry(policy(4), move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err("unreachable".to_string())
    })
    .await;
    assert_eq!(result, Err("unreachable".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn opens_a_store_on_disk() {
    let dir = std::env::temp_dir().join(format!("ehi-connect-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("store.db");

    assert!(open_store(&path, policy(1)).await.is_ok());
    let _ = std::fs::remove_dir_all(&dir);
  }
}
