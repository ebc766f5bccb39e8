//! SQL schema for the Censo SQLite store.
//!
//! Executed once at connection startup. Reference and census tables are
//! spelled out in [`SCHEMA`]; detail table DDL is generated from the column
//! lists in `encode`.

use censo_core::census::{Accessibility, Education, Infrastructure, Internet, Quotas, Staffing};

use crate::encode::{
  Columns, accessibility_columns, education_columns, infrastructure_columns,
  internet_columns, quotas_columns, staffing_columns,
};

/// Reference and census tables.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS states (
    state_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    code      TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL UNIQUE,
    region    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cities (
    city_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL,
    state_id  INTEGER NOT NULL REFERENCES states(state_id),
    UNIQUE (name, state_id)
);

-- Mutable: rewritten whenever a later census year arrives for the school.
CREATE TABLE IF NOT EXISTS schools (
    school_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    ibge_code           TEXT NOT NULL UNIQUE,
    name                TEXT NOT NULL,
    dependency          INTEGER NOT NULL,   -- 1 federal | 2 state | 3 municipal | 4 private
    private_category    INTEGER,            -- required iff dependency = 4
    location            INTEGER NOT NULL,   -- 1 urban | 2 rural
    city_id             INTEGER NOT NULL REFERENCES cities(city_id),
    street              TEXT NOT NULL,
    number              TEXT NOT NULL,
    complement          TEXT NOT NULL,
    neighborhood        TEXT NOT NULL,
    postal_code         TEXT NOT NULL,
    area_code           TEXT,
    phone               TEXT,
    academic_year_start TEXT,               -- ISO 8601 date
    academic_year_end   TEXT,
    last_census_year    INTEGER NOT NULL DEFAULT 0,  -- kept across census truncation
    CHECK ((dependency = 4) = (private_category IS NOT NULL))
);

-- Immutable; one row per school per year.
CREATE TABLE IF NOT EXISTS census_records (
    census_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id  INTEGER NOT NULL REFERENCES schools(school_id),
    year       INTEGER NOT NULL,
    UNIQUE (school_id, year)
);

CREATE INDEX IF NOT EXISTS cities_state_idx   ON cities(state_id);
CREATE INDEX IF NOT EXISTS schools_city_idx   ON schools(city_id);
CREATE INDEX IF NOT EXISTS census_year_idx    ON census_records(year);

PRAGMA user_version = 2;
";

fn detail_table(name: &str, extra: &[&str], columns: &Columns) -> String {
  let mut lines = vec![format!("{name}_id INTEGER PRIMARY KEY AUTOINCREMENT")];
  lines.extend(extra.iter().map(|l| (*l).to_owned()));
  lines.extend(
    columns
      .iter()
      .map(|(column, _)| format!("{column} INTEGER NOT NULL DEFAULT 0")),
  );
  format!(
    "CREATE TABLE IF NOT EXISTS {name} (\n    {}\n);\n",
    lines.join(",\n    ")
  )
}

/// DDL for the detail tables.
pub fn detail_schema() -> String {
  [
    detail_table("accessibility", &[], &accessibility_columns(&Accessibility::default())),
    detail_table("internet", &[], &internet_columns(&Internet::default())),
    detail_table("staffing", &[], &staffing_columns(&Staffing::default())),
    detail_table("quotas", &[], &quotas_columns(&Quotas::default())),
    detail_table(
      "infrastructure",
      &[
        "census_id INTEGER NOT NULL UNIQUE REFERENCES census_records(census_id)",
        "accessibility_id INTEGER NOT NULL UNIQUE REFERENCES accessibility(accessibility_id)",
        "internet_id INTEGER NOT NULL UNIQUE REFERENCES internet(internet_id)",
        "staffing_id INTEGER NOT NULL UNIQUE REFERENCES staffing(staffing_id)",
      ],
      &infrastructure_columns(&Infrastructure::default()),
    ),
    detail_table(
      "education",
      &[
        "census_id INTEGER NOT NULL UNIQUE REFERENCES census_records(census_id)",
        "quotas_id INTEGER NOT NULL UNIQUE REFERENCES quotas(quotas_id)",
      ],
      &education_columns(&Education::default()),
    ),
  ]
  .concat()
}
