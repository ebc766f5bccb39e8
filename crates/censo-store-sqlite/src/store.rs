//! [`SqliteStore`], the SQLite implementation of [`CensusStore`].

use std::{
  collections::{BTreeMap, HashSet},
  path::Path,
};

use rusqlite::{
  Connection, OptionalExtension as _, functions::FunctionFlags, params_from_iter, types::Value,
};
use tracing::debug;

use censo_core::{
  census::{CensusDetails, CensusKey, CensusRecord, Infrastructure, InfrastructureRecord},
  place::{City, CityKey, NewCity, NewState, State},
  school::{School, SchoolAttributes, SchoolField},
  store::{CensusStore, SchoolListing, SchoolQuery, Table},
};

use crate::{
  Result,
  encode::{
    Columns, RawSchool, SCHOOL_COLUMNS, accessibility_columns, decode_accessibility, decode_city,
    decode_education, decode_infrastructure, decode_internet, decode_quotas, decode_staffing,
    decode_state, education_columns, encode_school_field, infrastructure_columns,
    internet_columns, placeholders, quotas_columns, school_columns, staffing_columns,
  },
  schema::{SCHEMA, detail_schema},
};

/// Bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

const CITY_SELECT: &str = "SELECT c.city_id, c.name, c.state_id, s.code
   FROM cities c JOIN states s ON s.state_id = c.state_id";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A census store backed by a single SQLite file.
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

  /// Open an in-memory store, for tests and dry runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let details = detail_schema();
    self
      .conn
      .call(move |conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&details)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }
}

/// SQL functions the queries rely on. `casefold` lowercases the full Unicode
/// range, unlike SQLite's ASCII-only `LOWER`.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "casefold",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|text| text.to_lowercase()))
    },
  )
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Insert one row and return its rowid.
fn insert_columns(conn: &Connection, table: &str, columns: Columns) -> rusqlite::Result<i64> {
  let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
  let sql = format!(
    "INSERT INTO {table} ({}) VALUES ({})",
    names.join(", "),
    placeholders(names.len())
  );
  conn
    .prepare_cached(&sql)?
    .execute(params_from_iter(columns.into_iter().map(|(_, value)| value)))?;
  Ok(conn.last_insert_rowid())
}

/// Run `sql` (ending in `IN (`) once per chunk of `keys` and collect rows.
fn select_in<K, T>(
  conn: &Connection,
  sql: &str,
  keys: &[K],
  mut map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>>
where
  K: rusqlite::ToSql,
{
  let mut out = Vec::new();
  for chunk in keys.chunks(LOOKUP_CHUNK) {
    let query = format!("{sql}{})", placeholders(chunk.len()));
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(chunk.iter()), &mut map)?;
    for row in rows {
      out.push(row?);
    }
  }
  Ok(out)
}

/// Read the infrastructure owned by `census_id` along with its
/// sub-aggregates.
fn read_infrastructure(
  conn: &Connection,
  census_id: i64,
) -> rusqlite::Result<Option<(i64, Infrastructure)>> {
  let head = conn
    .query_row(
      "SELECT * FROM infrastructure WHERE census_id = ?1",
      [census_id],
      |row| {
        Ok((
          row.get::<_, i64>("infrastructure_id")?,
          row.get::<_, i64>("accessibility_id")?,
          row.get::<_, i64>("internet_id")?,
          row.get::<_, i64>("staffing_id")?,
          decode_infrastructure(row)?,
        ))
      },
    )
    .optional()?;

  let Some((infrastructure_id, accessibility_id, internet_id, staffing_id, mut infra)) = head
  else {
    return Ok(None);
  };

  infra.accessibility = conn.query_row(
    "SELECT * FROM accessibility WHERE accessibility_id = ?1",
    [accessibility_id],
    decode_accessibility,
  )?;
  infra.internet = conn.query_row(
    "SELECT * FROM internet WHERE internet_id = ?1",
    [internet_id],
    decode_internet,
  )?;
  infra.staffing = conn.query_row(
    "SELECT * FROM staffing WHERE staffing_id = ?1",
    [staffing_id],
    decode_staffing,
  )?;

  Ok(Some((infrastructure_id, infra)))
}

/// Census records of `year` for the given schools.
fn census_in_year(
  conn: &Connection,
  year: i32,
  school_ids: &[i64],
) -> rusqlite::Result<Vec<CensusRecord>> {
  let mut out = Vec::new();
  for chunk in school_ids.chunks(LOOKUP_CHUNK) {
    let query = format!(
      "SELECT census_id, school_id, year FROM census_records
        WHERE year = ? AND school_id IN ({})",
      placeholders(chunk.len())
    );
    let mut stmt = conn.prepare_cached(&query)?;
    let params = std::iter::once(Value::Integer(i64::from(year)))
      .chain(chunk.iter().map(|id| Value::Integer(*id)));
    let rows = stmt.query_map(params_from_iter(params), |row| {
      Ok(CensusRecord {
        census_id: row.get(0)?,
        school_id: row.get(1)?,
        year:      row.get(2)?,
      })
    })?;
    for row in rows {
      out.push(row?);
    }
  }
  Ok(out)
}

fn details_exist(conn: &Connection, census_id: i64) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM infrastructure WHERE census_id = ?1)
         OR EXISTS (SELECT 1 FROM education WHERE census_id = ?1)",
    [census_id],
    |row| row.get(0),
  )
}

fn write_details(conn: &Connection, details: CensusDetails) -> rusqlite::Result<()> {
  let CensusDetails { census_id, infrastructure, education } = details;

  let accessibility_id = insert_columns(
    conn,
    "accessibility",
    accessibility_columns(&infrastructure.accessibility),
  )?;
  let internet_id = insert_columns(conn, "internet", internet_columns(&infrastructure.internet))?;
  let staffing_id = insert_columns(conn, "staffing", staffing_columns(&infrastructure.staffing))?;

  let mut columns = vec![
    ("census_id", Value::Integer(census_id)),
    ("accessibility_id", Value::Integer(accessibility_id)),
    ("internet_id", Value::Integer(internet_id)),
    ("staffing_id", Value::Integer(staffing_id)),
  ];
  columns.extend(infrastructure_columns(&infrastructure));
  insert_columns(conn, "infrastructure", columns)?;

  let quotas_id = insert_columns(conn, "quotas", quotas_columns(&education.quotas))?;
  let mut columns = vec![
    ("census_id", Value::Integer(census_id)),
    ("quotas_id", Value::Integer(quotas_id)),
  ];
  columns.extend(education_columns(&education));
  insert_columns(conn, "education", columns)?;

  Ok(())
}

fn table_name(table: Table) -> &'static str {
  match table {
    Table::States => "states",
    Table::Cities => "cities",
    Table::Schools => "schools",
    Table::CensusRecords => "census_records",
    Table::Infrastructure => "infrastructure",
    Table::Education => "education",
    Table::Accessibility => "accessibility",
    Table::Internet => "internet",
    Table::Staffing => "staffing",
    Table::Quotas => "quotas",
  }
}

// ─── CensusStore impl ────────────────────────────────────────────────────────

impl CensusStore for SqliteStore {
  type Error = crate::Error;

  // ── Cache preload ─────────────────────────────────────────────────────────

  async fn load_states(&self) -> Result<Vec<State>> {
    let states = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT state_id, code, name, region FROM states")?;
        let rows = stmt
          .query_map([], decode_state)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(states)
  }

  async fn load_cities(&self) -> Result<Vec<City>> {
    let cities = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(CITY_SELECT)?;
        let rows = stmt
          .query_map([], decode_city)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(cities)
  }

  async fn load_schools(&self) -> Result<Vec<School>> {
    let raws: Vec<RawSchool> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {SCHOOL_COLUMNS} FROM schools"))?;
        let rows = stmt
          .query_map([], RawSchool::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchool::into_school).collect()
  }

  // ── Reference entities ────────────────────────────────────────────────────

  async fn insert_states(&self, states: Vec<NewState>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO states (code, name, region) VALUES (?1, ?2, ?3)
             ON CONFLICT (code) DO NOTHING
             ON CONFLICT (name) DO NOTHING",
          )?;
          for state in &states {
            inserted += stmt.execute(rusqlite::params![state.code, state.name, state.region])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn fetch_states(&self, codes: Vec<String>) -> Result<Vec<State>> {
    let states = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          "SELECT state_id, code, name, region FROM states WHERE code IN (",
          &codes,
          decode_state,
        )?)
      })
      .await?;
    Ok(states)
  }

  async fn insert_cities(&self, cities: Vec<NewCity>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO cities (name, state_id) VALUES (?1, ?2)
             ON CONFLICT (name, state_id) DO NOTHING",
          )?;
          for city in &cities {
            inserted += stmt.execute(rusqlite::params![city.name, city.state_id])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn fetch_cities(&self, keys: Vec<CityKey>) -> Result<Vec<City>> {
    let wanted: HashSet<CityKey> = keys.into_iter().collect();
    let names: Vec<String> = wanted
      .iter()
      .map(|k| k.name.clone())
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();

    let candidates = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          &format!("{CITY_SELECT} WHERE c.name IN ("),
          &names,
          decode_city,
        )?)
      })
      .await?;

    // A name lookup also matches homonymous cities in other states.
    Ok(
      candidates
        .into_iter()
        .filter(|city| wanted.contains(&city.key()))
        .collect(),
    )
  }

  async fn insert_schools(&self, schools: Vec<SchoolAttributes>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for school in &schools {
          let columns = school_columns(school);
          let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
          let sql = format!(
            "INSERT INTO schools ({}) VALUES ({}) ON CONFLICT (ibge_code) DO NOTHING",
            names.join(", "),
            placeholders(names.len())
          );
          inserted += tx
            .prepare_cached(&sql)?
            .execute(params_from_iter(columns.into_iter().map(|(_, v)| v)))?;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn fetch_schools(&self, codes: Vec<String>) -> Result<Vec<School>> {
    let raws: Vec<RawSchool> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          &format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE ibge_code IN ("),
          &codes,
          RawSchool::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawSchool::into_school).collect()
  }

  async fn update_schools(&self, schools: Vec<School>, fields: Vec<SchoolField>) -> Result<usize> {
    if schools.is_empty() || fields.is_empty() {
      return Ok(0);
    }

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0;
        for school in &schools {
          let mut assignments = Vec::with_capacity(fields.len());
          let mut values = Vec::with_capacity(fields.len() + 1);
          for field in &fields {
            let (column, value) = encode_school_field(*field, &school.attributes);
            assignments.push(format!("{column} = ?"));
            values.push(value);
          }
          values.push(Value::Integer(school.school_id));

          let sql = format!(
            "UPDATE schools SET {} WHERE school_id = ?",
            assignments.join(", ")
          );
          updated += tx.prepare_cached(&sql)?.execute(params_from_iter(values))?;
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    Ok(updated)
  }

  // ── Census records ────────────────────────────────────────────────────────

  async fn max_census_year(&self, school_id: i64) -> Result<Option<i32>> {
    let year = self
      .conn
      .call(move |conn| {
        let year: Option<i32> = conn
          .query_row(
            "SELECT MAX(
                      last_census_year,
                      COALESCE((SELECT MAX(year) FROM census_records WHERE school_id = ?1), 0)
                    )
               FROM schools WHERE school_id = ?1",
            [school_id],
            |row| row.get(0),
          )
          .optional()?;
        Ok(year)
      })
      .await?;
    Ok(year.filter(|year| *year > 0))
  }

  async fn insert_census_records(&self, keys: Vec<CensusKey>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut insert = tx.prepare(
            "INSERT INTO census_records (school_id, year) VALUES (?1, ?2)
             ON CONFLICT (school_id, year) DO NOTHING",
          )?;
          let mut bump = tx.prepare(
            "UPDATE schools SET last_census_year = MAX(last_census_year, ?2)
              WHERE school_id = ?1",
          )?;
          for key in &keys {
            inserted += insert.execute(rusqlite::params![key.school_id, key.year])?;
            bump.execute(rusqlite::params![key.school_id, key.year])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn fetch_census_records(
    &self,
    school_ids: Vec<i64>,
    year: i32,
  ) -> Result<Vec<CensusRecord>> {
    let records = self
      .conn
      .call(move |conn| Ok(census_in_year(conn, year, &school_ids)?))
      .await?;
    Ok(records)
  }

  async fn census_exists(&self, keys: Vec<CensusKey>) -> Result<HashSet<CensusKey>> {
    let mut by_year: BTreeMap<i32, Vec<i64>> = BTreeMap::new();
    for key in keys {
      by_year.entry(key.year).or_default().push(key.school_id);
    }

    let existing = self
      .conn
      .call(move |conn| {
        let mut existing = HashSet::new();
        for (year, school_ids) in &by_year {
          existing.extend(
            census_in_year(conn, *year, school_ids)?
              .iter()
              .map(CensusRecord::key),
          );
        }
        Ok(existing)
      })
      .await?;
    Ok(existing)
  }

  // ── Details ───────────────────────────────────────────────────────────────

  async fn insert_census_details(&self, details: Vec<CensusDetails>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for composite in details {
          if details_exist(&tx, composite.census_id)? {
            continue;
          }
          write_details(&tx, composite)?;
          inserted += 1;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn census_details(&self, census_id: i64) -> Result<Option<CensusDetails>> {
    let details = self
      .conn
      .call(move |conn| {
        let Some((_, infrastructure)) = read_infrastructure(conn, census_id)? else {
          return Ok(None);
        };

        let head = conn
          .query_row(
            "SELECT * FROM education WHERE census_id = ?1",
            [census_id],
            |row| Ok((row.get::<_, i64>("quotas_id")?, decode_education(row)?)),
          )
          .optional()?;
        let Some((quotas_id, mut education)) = head else {
          return Ok(None);
        };
        education.quotas = conn.query_row(
          "SELECT * FROM quotas WHERE quotas_id = ?1",
          [quotas_id],
          decode_quotas,
        )?;

        Ok(Some(CensusDetails { census_id, infrastructure, education }))
      })
      .await?;
    Ok(details)
  }

  async fn recent_infrastructure(&self, n: usize) -> Result<Vec<InfrastructureRecord>> {
    let limit = i64::try_from(n).unwrap_or(i64::MAX);
    let records = self
      .conn
      .call(move |conn| {
        let mut census_ids = {
          let mut stmt = conn.prepare(
            "SELECT census_id FROM infrastructure ORDER BY infrastructure_id DESC LIMIT ?1",
          )?;
          stmt
            .query_map([limit], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        census_ids.reverse();

        let mut records = Vec::with_capacity(census_ids.len());
        for census_id in census_ids {
          if let Some((infrastructure_id, infrastructure)) = read_infrastructure(conn, census_id)? {
            records.push(InfrastructureRecord { infrastructure_id, census_id, infrastructure });
          }
        }
        Ok(records)
      })
      .await?;
    Ok(records)
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn truncate_census(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "DELETE FROM infrastructure;
           DELETE FROM education;
           DELETE FROM accessibility;
           DELETE FROM internet;
           DELETE FROM staffing;
           DELETE FROM quotas;
           DELETE FROM census_records;",
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    debug!("census tables truncated");
    Ok(())
  }

  async fn count(&self, table: Table) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table_name(table));
    let count = self
      .conn
      .call(move |conn| {
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
      })
      .await?;
    Ok(u64::try_from(count).unwrap_or_default())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn search_schools<'a>(&'a self, query: &'a SchoolQuery) -> Result<Vec<SchoolListing>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    // Filters are folded here and columns by `casefold`; substrings match
    // with `instr`, so `%` and `_` are literal.
    if let Some(state) = &query.state {
      let state = state.to_lowercase();
      clauses.push("(casefold(s.name) = ? OR casefold(s.code) = ?)");
      params.push(Value::Text(state.clone()));
      params.push(Value::Text(state));
    }
    for (clause, filter) in [
      ("instr(casefold(c.name), ?) > 0", &query.city),
      ("instr(casefold(sc.name), ?) > 0", &query.name),
      ("instr(casefold(sc.neighborhood), ?) > 0", &query.neighborhood),
    ] {
      if let Some(text) = filter {
        clauses.push(clause);
        params.push(Value::Text(text.to_lowercase()));
      }
    }

    let filter = if clauses.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
      "SELECT sc.school_id, sc.ibge_code, sc.name, sc.street, sc.number, sc.neighborhood,
              c.name, s.code, s.name
         FROM schools sc
         JOIN cities c ON c.city_id = sc.city_id
         JOIN states s ON s.state_id = c.state_id
         {filter}
        ORDER BY s.name, sc.name, sc.school_id
        LIMIT ? OFFSET ?"
    );
    params.push(Value::Integer(i64::try_from(query.page_size()).unwrap_or(i64::MAX)));
    params.push(Value::Integer(
      i64::try_from(query.offset.unwrap_or(0)).unwrap_or(i64::MAX),
    ));

    let listings = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), |row| {
            Ok(SchoolListing {
              school_id:    row.get(0)?,
              ibge_code:    row.get(1)?,
              name:         row.get(2)?,
              street:       row.get(3)?,
              number:       row.get(4)?,
              neighborhood: row.get(5)?,
              city:         row.get(6)?,
              state_code:   row.get(7)?,
              state_name:   row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(listings)
  }
}
