//! Registry seeding from configuration.

use ehi_core::{site::NewSite, store::SiteStore};
use tracing::{info, warn};

/// Register `sites` if the registry is empty. Returns how many were added.
///
/// A non-empty registry is left untouched, so restarting with an edited seed
/// list never duplicates or moves existing sites.
pub async fn seed_sites<S: SiteStore>(store: &S, sites: &[NewSite]) -> Result<usize, S::Error> {
  let existing = store.list_sites().await?;
  if !existing.is_empty() {
    info!(sites = existing.len(), "site registry already populated");
    return Ok(0);
  }
  if sites.is_empty() {
    warn!("site registry is empty and no seed sites are configured");
    return Ok(0);
  }

  for site in sites {
    let added = store.add_site(site.clone()).await?;
    info!(id = added.id, name = %added.name, "seeded site");
  }
  Ok(sites.len())
}

#[cfg(test)]
mod tests {
  use ehi_store_sqlite::SqliteStore;

  use super::*;

  fn seeds() -> Vec<NewSite> {
    vec![
      NewSite::new("Grand Canyon NP", -112.11, 36.1).protected(),
      NewSite::new("Phoenix Urban", -112.07, 33.45),
    ]
  }

  #[tokio::test]
  async fn seeds_an_empty_registry_once() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    assert_eq!(seed_sites(&store, &seeds()).await.unwrap(), 2);
    assert_eq!(seed_sites(&store, &seeds()).await.unwrap(), 0);

    let sites = store.list_sites().await.unwrap();
    assert_eq!(sites.len(), 2);
    assert!(sites[0].protected_area);
  }

  #[tokio::test]
  async fn empty_seed_list_is_a_no_op() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    assert_eq!(seed_sites(&store, &[]).await.unwrap(), 0);
    assert!(store.list_sites().await.unwrap().is_empty());
  }
}
