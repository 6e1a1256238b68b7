//! Error type for `ehi-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A batch insert failed after the table had been cleared. The rows from
  /// earlier batches remain in place.
  #[error("replacing {table} failed after {written} rows: {source}")]
  PartialReplace {
    table:   &'static str,
    written: usize,
    #[source]
    source:  tokio_rusqlite::Error,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid stored value: {0}")]
  Decode(#[from] ehi_core::Error),

  #[error("site not found: {0}")]
  SiteNotFound(i64),

  #[error("site {0} has a partially set scoring block")]
  InconsistentScores(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
