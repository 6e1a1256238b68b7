//! [`SqliteStore`], the SQLite implementation of [`SiteStore`].

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use ehi_core::{
  aggregate::AggregateRow,
  geo::{BoundingBox, within_radius},
  scoring::SiteScores,
  site::{NewSite, Site, SiteId, point_wkt},
  source::{
    ClimateRecord, HumanPressureRecord, LandCoverRecord, LandCoverType, OccurrenceRecord,
    SourceRows,
  },
  store::{INSERT_BATCH_SIZE, SiteStore, StoreStatus, TableCounts},
};

use crate::{
  Error, Result,
  encode::{RawSite, SITE_COLUMNS, encode_dt, source_table},
  schema::SCHEMA,
};

/// Inserts one batch of rows inside an open transaction.
type BatchInsert<T> = fn(&rusqlite::Transaction<'_>, &[T]) -> rusqlite::Result<()>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An ecosystem health store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert `rows` in groups of [`INSERT_BATCH_SIZE`], one transaction per
  /// group. Earlier groups stay committed if a later one fails.
  async fn insert_batches<T>(
    &self,
    table:  &'static str,
    rows:   Vec<T>,
    insert: BatchInsert<T>,
  ) -> Result<usize>
  where
    T: Send + 'static,
  {
    let mut rows    = rows.into_iter().peekable();
    let mut written = 0;

    while rows.peek().is_some() {
      let batch: Vec<T> = rows.by_ref().take(INSERT_BATCH_SIZE).collect();
      let len = batch.len();

      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          insert(&tx, &batch)?;
          tx.commit()?;
          Ok(())
        })
        .await
        .map_err(|source| Error::PartialReplace { table, written, source })?;

      written += len;
    }

    Ok(written)
  }
}

// ─── Batch inserts ───────────────────────────────────────────────────────────

fn insert_occurrences(
  tx:   &rusqlite::Transaction<'_>,
  rows: &[OccurrenceRecord],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO occurrence (
       species_id, scientific_name, common_name, longitude, latitude,
       year, data_source, position
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
  )?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.species_id,
      r.scientific_name,
      r.common_name,
      r.longitude,
      r.latitude,
      r.year,
      r.data_source,
      point_wkt(r.longitude, r.latitude),
    ])?;
  }
  Ok(())
}

fn insert_climate(
  tx:   &rusqlite::Transaction<'_>,
  rows: &[ClimateRecord],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO climate (
       site_id, temperature_annual, precipitation_annual,
       temperature_trend, drought_index, year, data_source
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
  )?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.site_id,
      r.temperature_annual,
      r.precipitation_annual,
      r.temperature_trend,
      r.drought_index,
      r.year,
      r.data_source,
    ])?;
  }
  Ok(())
}

fn insert_land_cover(
  tx:   &rusqlite::Transaction<'_>,
  rows: &[LandCoverRecord],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO land_cover (
       site_id, land_cover_type, coverage_percentage, year, data_source
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.site_id,
      r.land_cover_type.as_str(),
      r.coverage_percentage,
      r.year,
      r.data_source,
    ])?;
  }
  Ok(())
}

fn insert_human_pressure(
  tx:   &rusqlite::Transaction<'_>,
  rows: &[HumanPressureRecord],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO human_pressure (
       site_id, human_footprint_index, pressure_type, year, data_source
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.site_id,
      r.human_footprint_index,
      r.pressure_type.as_str(),
      r.year,
      r.data_source,
    ])?;
  }
  Ok(())
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Distinct occurrences within `radius_km` of a point.
///
/// The R*Tree narrows candidates to the enclosing bounding box, queried once
/// per side when the box crosses the antimeridian; the exact great-circle
/// check runs on the stored coordinates.
fn count_occurrences_near(
  conn:      &rusqlite::Connection,
  lon:       f64,
  lat:       f64,
  radius_km: f64,
) -> rusqlite::Result<u32> {
  let mut stmt = conn.prepare_cached(
    "SELECT o.species_id, o.longitude, o.latitude
     FROM occurrence_position_idx r
     JOIN occurrence o ON o.id = r.id
     WHERE r.max_lon >= ?1 AND r.min_lon <= ?2
       AND r.max_lat >= ?3 AND r.min_lat <= ?4",
  )?;

  let mut seen = HashSet::new();
  for bbox in BoundingBox::around(lon, lat, radius_km).pieces() {
    let candidates = stmt.query_map(
      rusqlite::params![bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat],
      |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?)),
    )?;
    for candidate in candidates {
      let (species_id, o_lon, o_lat) = candidate?;
      if within_radius(lon, lat, o_lon, o_lat, radius_km) {
        seen.insert(species_id);
      }
    }
  }
  Ok(seen.len() as u32)
}

// ─── SiteStore impl ──────────────────────────────────────────────────────────

impl SiteStore for SqliteStore {
  type Error = Error;

  // ── Site registry ─────────────────────────────────────────────────────────

  async fn add_site(&self, site: NewSite) -> Result<Site> {
    let created_at = encode_dt(Utc::now());
    let position   = point_wkt(site.longitude, site.latitude);
    let insert     = site.clone();

    let id: SiteId = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sites (
             name, longitude, latitude, position, elevation, protected_area, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            insert.name,
            insert.longitude,
            insert.latitude,
            position,
            insert.elevation,
            insert.protected_area,
            created_at,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Site {
      id,
      name:           site.name,
      longitude:      site.longitude,
      latitude:       site.latitude,
      elevation:      site.elevation,
      protected_area: site.protected_area,
      scores:         None,
    })
  }

  async fn list_sites(&self) -> Result<Vec<Site>> {
    let raws: Vec<RawSite> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawSite::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSite::into_site).collect()
  }

  // ── Source tables ─────────────────────────────────────────────────────────

  async fn replace_all(&self, rows: SourceRows) -> Result<usize> {
    let table = source_table(rows.kind());

    self
      .conn
      .call(move |conn| {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
        Ok(())
      })
      .await?;

    match rows {
      SourceRows::Occurrence(rows) => {
        self.insert_batches(table, rows, insert_occurrences).await
      }
      SourceRows::Climate(rows) => self.insert_batches(table, rows, insert_climate).await,
      SourceRows::LandCover(rows) => {
        self.insert_batches(table, rows, insert_land_cover).await
      }
      SourceRows::HumanPressure(rows) => {
        self.insert_batches(table, rows, insert_human_pressure).await
      }
    }
  }

  // ── Aggregation & persistence ─────────────────────────────────────────────

  async fn aggregate(&self, radius_km: f64) -> Result<Vec<AggregateRow>> {
    let rows = self
      .conn
      .call(move |conn| {
        // One read transaction so every source is seen at the same instant.
        let tx = conn.transaction()?;

        let occurrence_total: i64 =
          tx.query_row("SELECT COUNT(*) FROM occurrence", [], |r| r.get(0))?;

        // `land_cover_type` is a bare column next to MAX(), so SQLite takes it
        // from the row holding the maximum.
        let mut rows = {
          let mut stmt = tx.prepare(
            "SELECT
               s.id, s.name, s.longitude, s.latitude, s.elevation, s.protected_area,
               c.avg_temperature_annual, c.avg_precipitation_annual,
               c.avg_temperature_trend, c.avg_drought_index,
               lc.max_coverage_percentage, lc.land_cover_type,
               hp.avg_human_pressure
             FROM sites s
             LEFT JOIN (
               SELECT site_id,
                      AVG(temperature_annual)   AS avg_temperature_annual,
                      AVG(precipitation_annual) AS avg_precipitation_annual,
                      AVG(temperature_trend)    AS avg_temperature_trend,
                      AVG(drought_index)        AS avg_drought_index
               FROM climate GROUP BY site_id
             ) c  ON c.site_id  = s.id
             LEFT JOIN (
               SELECT site_id,
                      MAX(coverage_percentage) AS max_coverage_percentage,
                      land_cover_type
               FROM land_cover GROUP BY site_id
             ) lc ON lc.site_id = s.id
             LEFT JOIN (
               SELECT site_id, AVG(human_footprint_index) AS avg_human_pressure
               FROM human_pressure GROUP BY site_id
             ) hp ON hp.site_id = s.id
             ORDER BY s.id",
          )?;
          stmt
            .query_map([], |row| {
              let land_cover: Option<String> = row.get(11)?;
              Ok((
                AggregateRow {
                  site_id:                  row.get(0)?,
                  name:                     row.get(1)?,
                  longitude:                row.get(2)?,
                  latitude:                 row.get(3)?,
                  elevation:                row.get(4)?,
                  protected_area:           row.get(5)?,
                  occurrence_count:         None,
                  avg_temperature_annual:   row.get(6)?,
                  avg_precipitation_annual: row.get(7)?,
                  avg_temperature_trend:    row.get(8)?,
                  avg_drought_index:        row.get(9)?,
                  max_coverage_percentage:  row.get(10)?,
                  dominant_land_cover:      None,
                  avg_human_pressure:       row.get(12)?,
                },
                land_cover,
              ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        if occurrence_total > 0 {
          for (row, _) in &mut rows {
            row.occurrence_count =
              Some(count_occurrences_near(&tx, row.longitude, row.latitude, radius_km)?);
          }
        }

        tx.commit()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(mut row, land_cover)| -> Result<AggregateRow> {
        row.dominant_land_cover =
          land_cover.as_deref().map(str::parse::<LandCoverType>).transpose()?;
        Ok(row)
      })
      .collect()
  }

  async fn update_scores(
    &self,
    site_id: SiteId,
    scores:  SiteScores,
    at:      DateTime<Utc>,
  ) -> Result<()> {
    let at_str = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sites SET
             biodiversity_score   = ?1,
             climate_score        = ?2,
             human_pressure_score = ?3,
             vegetation_score     = ?4,
             composite_ehi        = ?5,
             last_calculated      = ?6
           WHERE id = ?7",
          rusqlite::params![
            scores.sub.biodiversity,
            scores.sub.climate,
            scores.sub.human_pressure,
            scores.sub.vegetation,
            scores.composite,
            at_str,
            site_id,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SiteNotFound(site_id));
    }
    Ok(())
  }

  async fn status(&self) -> Result<StoreStatus> {
    let status = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM sites),
             (SELECT COUNT(*) FROM occurrence),
             (SELECT COUNT(*) FROM climate),
             (SELECT COUNT(*) FROM land_cover),
             (SELECT COUNT(*) FROM human_pressure),
             (SELECT AVG(composite_ehi) FROM sites)",
          [],
          |row| {
            Ok(StoreStatus {
              counts: TableCounts {
                sites:          row.get::<_, i64>(0)? as u64,
                occurrence:     row.get::<_, i64>(1)? as u64,
                climate:        row.get::<_, i64>(2)? as u64,
                land_cover:     row.get::<_, i64>(3)? as u64,
                human_pressure: row.get::<_, i64>(4)? as u64,
              },
              avg_composite_ehi: row.get(5)?,
            })
          },
        )?)
      })
      .await?;

    Ok(status)
  }
}
