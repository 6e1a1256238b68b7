//! SQL schema for the ecosystem health SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sites (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    name                 TEXT    NOT NULL,
    longitude            REAL    NOT NULL,
    latitude             REAL    NOT NULL,
    position             TEXT    NOT NULL,   -- WKT POINT(lon lat)
    biodiversity_score   REAL,
    climate_score        REAL,
    human_pressure_score REAL,
    vegetation_score     REAL,
    composite_ehi        REAL,
    elevation            INTEGER,
    protected_area       INTEGER NOT NULL DEFAULT 0,
    last_calculated      TEXT,               -- RFC 3339 UTC
    created_at           TEXT    NOT NULL,
    -- The scoring block is written as a unit.
    CHECK (
      (biodiversity_score IS NULL AND climate_score IS NULL
        AND human_pressure_score IS NULL AND vegetation_score IS NULL
        AND composite_ehi IS NULL AND last_calculated IS NULL)
      OR
      (biodiversity_score IS NOT NULL AND climate_score IS NOT NULL
        AND human_pressure_score IS NOT NULL AND vegetation_score IS NOT NULL
        AND composite_ehi IS NOT NULL AND last_calculated IS NOT NULL)
    )
);

-- Occurrences belong to no site; they are matched by proximity.
CREATE TABLE IF NOT EXISTS occurrence (
    id              INTEGER PRIMARY KEY,
    species_id      TEXT    NOT NULL UNIQUE,
    scientific_name TEXT    NOT NULL,
    common_name     TEXT    NOT NULL,
    longitude       REAL    NOT NULL,
    latitude        REAL    NOT NULL,
    year            INTEGER NOT NULL,
    data_source     TEXT    NOT NULL,
    position        TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS climate (
    id                   INTEGER PRIMARY KEY,
    site_id              INTEGER NOT NULL REFERENCES sites(id),
    temperature_annual   REAL    NOT NULL,
    precipitation_annual REAL    NOT NULL,
    temperature_trend    REAL    NOT NULL,
    drought_index        REAL    NOT NULL,
    year                 INTEGER NOT NULL,
    data_source          TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS land_cover (
    id                  INTEGER PRIMARY KEY,
    site_id             INTEGER NOT NULL REFERENCES sites(id),
    land_cover_type     TEXT    NOT NULL,   -- forest | grassland | wetland | agriculture | urban
    coverage_percentage REAL    NOT NULL,
    year                INTEGER NOT NULL,
    data_source         TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS human_pressure (
    id                    INTEGER PRIMARY KEY,
    site_id               INTEGER NOT NULL REFERENCES sites(id),
    human_footprint_index REAL    NOT NULL,
    pressure_type         TEXT    NOT NULL,   -- urbanization | agriculture
    year                  INTEGER NOT NULL,
    data_source           TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS climate_site_idx        ON climate(site_id);
CREATE INDEX IF NOT EXISTS land_cover_site_idx     ON land_cover(site_id);
CREATE INDEX IF NOT EXISTS human_pressure_site_idx ON human_pressure(site_id);

-- Spatial index over occurrence positions. Points are stored as degenerate
-- boxes; the triggers keep it in step with the base table.
CREATE VIRTUAL TABLE IF NOT EXISTS occurrence_position_idx
    USING rtree(id, min_lon, max_lon, min_lat, max_lat);

CREATE TRIGGER IF NOT EXISTS occurrence_position_ai AFTER INSERT ON occurrence BEGIN
    INSERT INTO occurrence_position_idx
    VALUES (new.id, new.longitude, new.longitude, new.latitude, new.latitude);
END;

CREATE TRIGGER IF NOT EXISTS occurrence_position_ad AFTER DELETE ON occurrence BEGIN
    DELETE FROM occurrence_position_idx WHERE id = old.id;
END;

PRAGMA user_version = 1;
";
